use anyhow::{Context, Result};
use attendance::{
    auth::accounts::create_superuser, config::ConfigLoader, db, services::ServiceError,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "create_superuser")]
#[command(about = "Create a superuser, or promote an existing account with the same email")]
struct Args {
    /// Login email of the superuser
    #[arg(long)]
    email: String,

    /// Username used when a new account is created
    #[arg(long, default_value = "admin")]
    username: String,

    /// Password; read from ATTENDANCE_SUPERUSER_PASSWORD when omitted
    #[arg(long, env = "ATTENDANCE_SUPERUSER_PASSWORD", hide_env_values = true)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    db::run_migrations(&db).await?;

    let (user, created) =
        match create_superuser(&db, &args.email, &args.username, &args.password).await {
            Ok(done) => done,
            Err(ServiceError::Validation(errors)) => {
                for error in errors.errors() {
                    eprintln!("{}: {}", error.field, error.error);
                }
                anyhow::bail!("invalid superuser details");
            }
            Err(err) => return Err(err).context("creating superuser"),
        };

    if created {
        println!("Created superuser {} ({})", user.email, user.id);
    } else {
        println!("Promoted existing user {} ({}) to superuser", user.email, user.id);
    }
    Ok(())
}
