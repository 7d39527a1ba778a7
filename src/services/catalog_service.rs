use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
    sea_query::{Expr, Func},
};
use uuid::Uuid;

use crate::{
    entity::{
        product_variants::{Column as VariantCol, Entity as ProductVariants, Model as VariantModel},
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    models::{Product, ProductVariant},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn list_products(state: &AppState, query: ProductQuery) -> AppResult<(Vec<Product>, i64)> {
    let (_, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        condition = condition.add(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(ProdCol::Name))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(ProdCol::Description))).like(pattern)),
        );
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => ProdCol::CreatedAt,
        ProductSortBy::Name => ProdCol::Name,
    };
    let mut finder = Products::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let products = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
    let mut variants = variants_by_product(&state.orm, &ids).await?;
    let items = products
        .into_iter()
        .map(|product| {
            let own = variants.remove(&product.id).unwrap_or_default();
            product_from_entity(product, own)
        })
        .collect();

    Ok((items, total))
}

pub async fn get_product<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<Product> {
    let product = Products::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    let variants = ProductVariants::find()
        .filter(VariantCol::ProductId.eq(id))
        .order_by_asc(VariantCol::Price)
        .all(conn)
        .await?;
    Ok(product_from_entity(product, variants))
}

/// A variant, but only when it belongs to `product_id`.
pub async fn find_variant<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variant_id: Uuid,
) -> AppResult<Option<VariantModel>> {
    let variant = ProductVariants::find()
        .filter(VariantCol::Id.eq(variant_id))
        .filter(VariantCol::ProductId.eq(product_id))
        .one(conn)
        .await?;
    Ok(variant)
}

pub async fn variants_by_id<C: ConnectionTrait>(
    conn: &C,
    ids: &[Uuid],
) -> AppResult<HashMap<Uuid, VariantModel>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let variants = ProductVariants::find()
        .filter(VariantCol::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await?;
    Ok(variants.into_iter().map(|v| (v.id, v)).collect())
}

async fn variants_by_product<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<VariantModel>>> {
    let mut grouped: HashMap<Uuid, Vec<VariantModel>> = HashMap::new();
    if product_ids.is_empty() {
        return Ok(grouped);
    }
    let variants = ProductVariants::find()
        .filter(VariantCol::ProductId.is_in(product_ids.iter().copied()))
        .order_by_asc(VariantCol::Price)
        .all(conn)
        .await?;
    for variant in variants {
        grouped.entry(variant.product_id).or_default().push(variant);
    }
    Ok(grouped)
}

fn product_from_entity(model: ProductModel, variants: Vec<VariantModel>) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        variants: variants.into_iter().map(variant_from_entity).collect(),
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn variant_from_entity(model: VariantModel) -> ProductVariant {
    ProductVariant {
        id: model.id,
        product_id: model.product_id,
        sku: model.sku,
        name: model.name,
        price: model.price,
        stock: model.stock,
    }
}
