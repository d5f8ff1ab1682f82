use std::env;

use msc_receipts::auth::hash_password;
use msc_receipts::db::{self, migrations, AdminStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "database.sqlite".to_string());
    println!("Starting database migration on {}...", db_path);

    let pool = db::init_pool(&db_path)?;
    {
        let mut conn = pool.get()?;
        let before = migrations::current_version(&conn)?;
        let applied = migrations::run(&mut conn)?;
        if applied.is_empty() {
            println!("Schema already at version {}.", before);
        } else {
            println!(
                "Applied migrations {:?} (version {} -> {}).",
                applied,
                before,
                migrations::latest_version()
            );
        }
    }

    // ADMIN_USERS=sandy:secret,office:other
    let admins = AdminStore::new(pool);
    let seeds = env::var("ADMIN_USERS").unwrap_or_default();
    for entry in seeds.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((username, password)) = entry.split_once(':') else {
            eprintln!("Skipping malformed ADMIN_USERS entry (expected user:password)");
            continue;
        };
        let (username, password) = (username.trim(), password.trim());
        if username.is_empty() || password.is_empty() {
            eprintln!("Skipping ADMIN_USERS entry with an empty username or password");
            continue;
        }
        let hash = hash_password(password)
            .map_err(|e| anyhow::anyhow!("hashing password for {}: {}", username, e))?;
        admins.upsert(username, &hash).await?;
        println!("Admin account {} is ready.", username);
    }

    println!("Migration complete.");
    Ok(())
}
