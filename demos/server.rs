//
//  Sample application.
//
//  Listens on localhost:4918, plain http, no ssl.
//  Connect to http://localhost:4918/ with one of the --user credentials.
//

use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use futures_util::future::TryFutureExt;

use cloud_dav::{DavServer, LockSystem, SqliteStore, StoreOptions, UserTable};
use dav_server::fs::DavFileSystem;
use dav_server::localfs::LocalFs;
use dav_server::memfs::MemFs;

#[derive(Debug, clap::Parser)]
#[command(about, version)]
struct Cli {
    /// port to listen on
    #[arg(short, long, default_value = "4918")]
    port: u16,
    /// local directory to serve (default: ephemeral memory filesystem)
    #[arg(short, long)]
    dir: Option<String>,
    /// property database (default: in memory)
    #[arg(long)]
    db: Option<String>,
    /// table name prefix in the property database
    #[arg(long, default_value = "")]
    table_prefix: String,
    /// user as name:password, can be repeated
    #[arg(short, long = "user", required = true)]
    users: Vec<String>,
    /// use fake memory locksystem
    #[arg(short, long)]
    fakels: bool,
}

fn user_table(users: &[String]) -> Result<UserTable, Box<dyn Error>> {
    let mut table = UserTable::new();
    for user in users {
        let (name, password) = user
            .split_once(':')
            .ok_or_else(|| format!("--user {}: expected name:password", user))?;
        table = table.user(name, password);
    }
    Ok(table)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let options = StoreOptions::default().table_prefix(cli.table_prefix);
    let store = match cli.db.as_ref() {
        Some(db) => SqliteStore::open(db, options)?,
        None => SqliteStore::open_in_memory(options)?,
    };
    let (fs, name) = match cli.dir.as_ref() {
        Some(dir) => (
            LocalFs::new(dir, false, false, false) as Box<dyn DavFileSystem>,
            dir.as_str(),
        ),
        None => (MemFs::new() as Box<dyn DavFileSystem>, "memory filesystem"),
    };

    let dav_server = DavServer::builder()
        .filesystem(fs)
        .store(Arc::new(store))
        .authenticator(Arc::new(user_table(&cli.users)?))
        .locksystem(if cli.fakels {
            LockSystem::Fake
        } else {
            LockSystem::Mem
        })
        .build()?;

    let make_service = hyper::service::make_service_fn(|_| {
        let dav_server = dav_server.clone();
        async move {
            let func = move |req: hyper::Request<hyper::Body>| {
                let dav_server = dav_server.clone();
                async move { Ok::<_, Infallible>(dav_server.handle(req).await) }
            };
            Ok::<_, hyper::Error>(hyper::service::service_fn(func))
        }
    });

    let addr = format!("0.0.0.0:{}", cli.port);
    let addr = SocketAddr::from_str(&addr)?;

    let server = hyper::Server::try_bind(&addr)?
        .serve(make_service)
        .map_err(|e| eprintln!("server error: {}", e));

    println!("Serving {} on {}", name, cli.port);
    let _ = server.await;
    Ok(())
}
