use serde_json::json;
use storefront_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    run_migrations(&pool).await?;

    let admin_password =
        std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "admin12345".to_string());
    let customer_password =
        std::env::var("SEED_CUSTOMER_PASSWORD").unwrap_or_else(|_| "customer123".to_string());

    let admin_id = ensure_user(
        &pool,
        "admin@example.com",
        "Store Admin",
        &admin_password,
        "ADMIN",
    )
    .await?;
    let customer_id = ensure_user(
        &pool,
        "customer@example.com",
        "Jamie Customer",
        &customer_password,
        "CUSTOMER",
    )
    .await?;
    seed_categories(&pool).await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, Customer ID: {customer_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, name, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, updated_at = now()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

async fn seed_categories(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let categories = [
        ("Rings", "Engagement, stacking and statement rings"),
        ("Necklaces", "Pendants, chains and chokers"),
        ("Earrings", "Studs, hoops and drops"),
        ("Bracelets", "Bangles, cuffs and charm bracelets"),
    ];

    for (name, description) in categories {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .execute(pool)
        .await?;
    }

    println!("Seeded categories");
    Ok(())
}

struct SeedProduct {
    name: &'static str,
    description: &'static str,
    price: f64,
    stock: i32,
    category: &'static str,
    features: &'static [&'static str],
    tags: &'static [&'static str],
    specs: serde_json::Value,
    featured: bool,
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        SeedProduct {
            name: "Solitaire Diamond Ring",
            description: "A single brilliant-cut diamond on a slim platinum band.",
            price: 1899.0,
            stock: 5,
            category: "Rings",
            features: &["Conflict-free diamond", "Gift box included"],
            tags: &["engagement", "diamond", "platinum"],
            specs: json!([
                { "name": "Metal", "value": "Platinum" },
                { "name": "Carat", "value": "0.5" }
            ]),
            featured: true,
        },
        SeedProduct {
            name: "Stacking Gold Band",
            description: "Thin polished band made to be worn in threes.",
            price: 149.0,
            stock: 40,
            category: "Rings",
            features: &["14k solid gold"],
            tags: &["gold", "minimal"],
            specs: json!([{ "name": "Metal", "value": "14k Gold" }]),
            featured: false,
        },
        SeedProduct {
            name: "Freshwater Pearl Pendant",
            description: "A lustrous freshwater pearl on a fine sterling chain.",
            price: 89.5,
            stock: 25,
            category: "Necklaces",
            features: &["Adjustable chain", "Hypoallergenic"],
            tags: &["pearl", "silver"],
            specs: json!([{ "name": "Chain length", "value": "45 cm" }]),
            featured: true,
        },
        SeedProduct {
            name: "Sapphire Drop Earrings",
            description: "Oval sapphires framed in white gold.",
            price: 620.0,
            stock: 3,
            category: "Earrings",
            features: &["Lever-back closure"],
            tags: &["sapphire", "white gold"],
            specs: json!([{ "name": "Stone", "value": "Sapphire" }]),
            featured: true,
        },
        SeedProduct {
            name: "Silver Charm Bracelet",
            description: "Sterling silver link bracelet with three starter charms.",
            price: 75.0,
            stock: 60,
            category: "Bracelets",
            features: &["Extra charms sold separately"],
            tags: &["silver", "charm", "gift"],
            specs: json!([{ "name": "Metal", "value": "Sterling Silver" }]),
            featured: false,
        },
    ];

    for product in products {
        let features: Vec<String> = product.features.iter().map(|s| s.to_string()).collect();
        let tags: Vec<String> = product.tags.iter().map(|s| s.to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, price, stock, category_id,
                features, tags, specs, is_featured
            )
            SELECT $1, $2, $3, $4, $5, c.id, $7, $8, $9, $10
            FROM categories c
            WHERE lower(c.name) = lower($6)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product.name)
        .bind(product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.category)
        .bind(features)
        .bind(tags)
        .bind(product.specs)
        .bind(product.featured)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
