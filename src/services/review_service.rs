use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::reviews::{CreateReviewRequest, ReviewList},
    entity::{
        products::Entity as Products,
        reviews::{self, Column as ReviewCol, Entity as Reviews},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthContext,
    models::Review,
    response::ApiResponse,
    state::AppState,
};

pub fn average_rating(ratings: &[i32]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let avg = sum as f64 / ratings.len() as f64;
    Some((avg * 10.0).round() / 10.0)
}

async fn ensure_product(state: &AppState, id: Uuid) -> AppResult<()> {
    Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product with ID {id}")))?;
    Ok(())
}

pub async fn list_product_reviews(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<ReviewList>> {
    ensure_product(state, product_id).await?;
    let reviews: Vec<Review> = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .order_by_desc(ReviewCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Review::from)
        .collect();
    let ratings: Vec<i32> = reviews.iter().map(|r| r.rating).collect();

    Ok(ApiResponse::success(
        "Reviews",
        ReviewList {
            average_rating: average_rating(&ratings),
            count: reviews.len() as i64,
            reviews,
        },
    ))
}

/// One review per user and product; posting again replaces it.
pub async fn upsert_review(
    state: &AppState,
    ctx: &AuthContext,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    payload.validate()?;
    ensure_product(state, payload.product_id).await?;

    let comment = payload
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    let model = Reviews::insert(reviews::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(ctx.user_id),
        product_id: Set(payload.product_id),
        rating: Set(payload.rating),
        comment: Set(comment),
        created_at: NotSet,
    })
    .on_conflict(
        OnConflict::columns([ReviewCol::UserId, ReviewCol::ProductId])
            .update_columns([ReviewCol::Rating, ReviewCol::Comment])
            .to_owned(),
    )
    .exec_with_returning(&state.orm)
    .await?;

    tracing::info!(
        review_id = %model.id,
        product_id = %model.product_id,
        rating = model.rating,
        "review saved"
    );
    Ok(ApiResponse::success("Review saved", model.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_rounded_to_one_decimal() {
        assert_eq!(average_rating(&[]), None);
        assert_eq!(average_rating(&[5]), Some(5.0));
        assert_eq!(average_rating(&[5, 4, 4]), Some(4.3));
    }
}
