//! th-cli: a thin, contract-only wrapper (the CLI surface itself is out of
//! scope) exposing only the one operational entrypoint that has no other
//! home — `db migrate` (§6 Migrations: "runs at startup or via an explicit
//! `db migrate` entrypoint").

use th_persistence::{connect_any, run_migrations};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    let _ = dotenvy::dotenv();

    let mut args = std::env::args().skip(1);
    match (args.next().as_deref(), args.next().as_deref()) {
        (Some("db"), Some("migrate")) => {
            let database_url = std::env::var("TH_DATABASE_URL").expect("TH_DATABASE_URL must be set");
            let pool = connect_any(&database_url).await.expect("failed to connect to database");
            run_migrations(&pool).await.expect("migration failed");
            println!("migrations applied");
        }
        _ => {
            eprintln!("usage: th-cli db migrate");
            std::process::exit(1);
        }
    }
}
