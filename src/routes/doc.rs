use utoipa::{
    Modify, OpenApi,
    openapi::{
        self, OpenApi as OpenApiSpec,
        security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AuthPayload, LoginRequest, RegisterRequest},
        cart::{AddToCartRequest, CartLine, CartView, UpdateCartItemRequest},
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        dashboard::DashboardStats,
        orders::{
            CreateOrderRequest, OrderLineRequest, OrderList, OrderWithItems,
            UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{CreateReviewRequest, ReviewList},
        users::{
            CreateUserRequest, UpdateProfileRequest, UpdateRoleRequest, UpdateUserRequest,
            UserList,
        },
        wishlist::{AddWishlistRequest, WishlistView},
    },
    error::ErrorData,
    models::{Category, Order, OrderItem, OrderStatus, Product, ProductSpec, Review, Role, User},
    response::{ApiResponse, Deleted, Pagination},
    routes::{admin, auth, cart, health, orders, reviews, shop, user, wishlist},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "cookie_auth",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("token"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::me,
        shop::list_products,
        shop::featured_products,
        shop::bestsellers,
        shop::get_product,
        shop::product_reviews,
        shop::list_categories,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_cart_item,
        cart::clear_cart,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        user::get_profile,
        user::update_profile,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        reviews::create_review,
        admin::list_products,
        admin::create_product,
        admin::get_product,
        admin::update_product,
        admin::delete_product,
        admin::list_categories,
        admin::create_category,
        admin::get_category,
        admin::update_category,
        admin::delete_category,
        admin::list_orders,
        admin::create_order,
        admin::get_order,
        admin::update_order_status,
        admin::list_users,
        admin::create_user,
        admin::update_user,
        admin::delete_user,
        admin::update_user_role,
        admin::dashboard
    ),
    components(
        schemas(
            User,
            Role,
            Category,
            Product,
            ProductSpec,
            Order,
            OrderStatus,
            OrderItem,
            Review,
            RegisterRequest,
            LoginRequest,
            AuthPayload,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartLine,
            CartView,
            AddWishlistRequest,
            WishlistView,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            OrderLineRequest,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            CreateReviewRequest,
            ReviewList,
            UpdateRoleRequest,
            CreateUserRequest,
            UpdateUserRequest,
            UpdateProfileRequest,
            UserList,
            DashboardStats,
            Deleted,
            Pagination,
            ErrorData,
            ApiResponse<ErrorData>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and session endpoints"),
        (name = "Shop", description = "Public catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "User", description = "Profile endpoints"),
        (name = "Orders", description = "Customer order endpoints"),
        (name = "Reviews", description = "Product review endpoints"),
        (name = "Admin", description = "Back-office endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
