use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        product_variants::ActiveModel as VariantActive,
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    services::auth_service::{ROLE_ADMIN, ROLE_CUSTOMER, hash_password},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin@example.com", "admin12345", ROLE_ADMIN).await?;
    let user_id = ensure_user(&orm, "user@example.com", "user12345", ROLE_CUSTOMER).await?;
    seed_products(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        let mut active: UserActive = existing.into();
        active.role = Set(role.to_string());
        let user = active.update(orm).await?;
        return Ok(user.id);
    }

    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;
    Ok(user.id)
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let catalog: [(&str, &str, &[(&str, &str, i64, i32)]); 4] = [
        (
            "Axum Hoodie",
            "Warm hoodie for Rustaceans",
            &[("HOODIE-M", "Size M", 550_000, 50), ("HOODIE-L", "Size L", 570_000, 30)],
        ),
        (
            "Ferris Mug",
            "Coffee tastes better with Ferris",
            &[("MUG-STD", "Standard", 120_000, 100)],
        ),
        (
            "Rust Sticker Pack",
            "Decorate your laptop",
            &[("STICKER-10", "10 stickers", 50_000, 200), ("STICKER-25", "25 stickers", 110_000, 80)],
        ),
        (
            "E-book: Async Rust",
            "Learn async Rust patterns",
            &[("EBOOK-ASYNC", "PDF", 250_000, 75)],
        ),
    ];

    for (name, description, variants) in catalog {
        let exists = Products::find()
            .filter(ProdCol::Name.eq(name))
            .one(orm)
            .await?;
        if exists.is_some() {
            continue;
        }

        let now = Utc::now();
        let txn = orm.begin().await?;
        let product = ProductActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
        for (sku, variant_name, price, stock) in variants {
            VariantActive {
                id: Set(Uuid::new_v4()),
                product_id: Set(product.id),
                sku: Set(sku.to_string()),
                name: Set(variant_name.to_string()),
                price: Set(*price),
                stock: Set(*stock),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;
    }

    println!("Seeded products");
    Ok(())
}
