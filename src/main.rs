//! CLI for postbus
//!
//! Subcommands:
//! - `serve`: run the posts and users services together
//! - `posts` / `users`: run one service on its own
//! - `watch`: live posts table, refreshed whenever a post is created
//! - `create-post` / `create-user`: one-shot mutations

use std::ops::ControlFlow;
use std::sync::Arc;

use clap::Parser;
use postbus::bus::EventBus;
use postbus::config::{Settings, load_config};
use postbus::gateway::MutationGateway;
use postbus::store::{NewPost, NewUser, SledStore};
use postbus::transport::message::{PostRequest, ServerMessage, UserRequest};
use postbus::transport::websocket::bind;
use postbus::transport::{PostsService, UsersService, start_websocket_server};
use postbus::utils::logging;
use postbus::viewer::{render_table, request, watch};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "postbus")]
enum Command {
    /// Start both services
    Serve,
    /// Start the posts service only
    Posts,
    /// Start the users service only
    Users,
    /// Print the posts table and refresh it on every new post
    Watch {
        /// Posts service URL (default: from `posts` settings)
        #[arg(long)]
        url: Option<String>,
    },
    /// Create a post through the posts service
    CreatePost {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        owner: String,
    },
    /// Create a user through the users service
    CreateUser {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            return;
        }
    };
    logging::init(&config.log.level);

    let cmd = Command::parse();

    let result = match cmd {
        Command::Serve => run_services(&config, true, true).await,
        Command::Posts => run_services(&config, true, false).await,
        Command::Users => run_services(&config, false, true).await,
        Command::Watch { url } => run_watch(&posts_url(&config, url)).await,
        Command::CreatePost {
            url,
            title,
            content,
            owner,
        } => {
            let msg = PostRequest::create(NewPost::new(title, content, owner));
            run_request(&posts_url(&config, url), &msg).await
        }
        Command::CreateUser { url, name, email } => {
            let msg = UserRequest::create(NewUser::new(name, email));
            run_request(&users_url(&config, url), &msg).await
        }
    };

    if let Err(e) = result {
        error!("postbus failed: {e}");
    }
}

fn posts_url(config: &Settings, url: Option<String>) -> String {
    url.unwrap_or_else(|| format!("ws://{}", config.posts.addr()))
}

fn users_url(config: &Settings, url: Option<String>) -> String {
    url.unwrap_or_else(|| format!("ws://{}", config.users.addr()))
}

async fn run_services(
    config: &Settings,
    posts: bool,
    users: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bus = Arc::new(EventBus::new(&config.bus));
    let queue_capacity = config.bus.channel_capacity;

    // Each service owns its database, so `posts` and `users` can run as
    // separate processes.
    let posts_server = if posts {
        let store = Arc::new(SledStore::open(&config.store.for_service("posts"))?);
        let listener = bind(&config.posts.addr()).await?;
        let service = PostsService::new(MutationGateway::new(store, bus.clone()));
        Some(tokio::spawn(start_websocket_server(
            listener,
            Arc::new(service),
            queue_capacity,
        )))
    } else {
        None
    };

    let users_server = if users {
        let store = Arc::new(SledStore::open(&config.store.for_service("users"))?);
        let listener = bind(&config.users.addr()).await?;
        let service = UsersService::new(store);
        Some(tokio::spawn(start_websocket_server(
            listener,
            Arc::new(service),
            queue_capacity,
        )))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully.");

    // Ends every open subscription before the listeners go away.
    bus.shutdown();
    for server in [posts_server, users_server].into_iter().flatten() {
        server.abort();
    }
    Ok(())
}

async fn run_watch(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    watch(url, |posts| {
        println!("{}", render_table(posts));
        ControlFlow::Continue(())
    })
    .await?;
    Ok(())
}

async fn run_request<T: serde::Serialize>(
    url: &str,
    msg: &T,
) -> Result<(), Box<dyn std::error::Error>> {
    match request(url, msg).await? {
        ServerMessage::Post { post } => println!("{}", serde_json::to_string_pretty(&post)?),
        ServerMessage::User { user } => println!("{}", serde_json::to_string_pretty(&user)?),
        other => info!("Unexpected reply: {other:?}"),
    }
    Ok(())
}
