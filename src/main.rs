#[macro_use]
extern crate diesel;
extern crate dotenv;

pub mod schema;
pub mod database;
pub mod app;

mod auth;
mod media;
mod routes;

use actix_web::{middleware, web, App, HttpServer};
use app::{config::Config, AppState};
use routes::{blog::*, comment::*, token::*, user::*};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(config);

    log::info!("Server running on {}", bind_addr);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .service(
                web::scope("/api/v1")
                    //Auth routes; the fixed-segment ones register before /auth/{_id}
                    .service(register)
                    .service(login)
                    .service(refresh_token)
                    .service(logout)
                    .service(get_me)
                    .service(update_user)
                    .service(get_user_by_id)
                    .service(delete_user)
                    //User routes
                    .service(get_all_users)
                    .service(login_status)
                    //Blog routes
                    .service(create_blog)
                    .service(get_all_blogs)
                    .service(get_blog_comments)
                    .service(get_blog_author)
                    .service(get_blog_likes)
                    .service(like_blog)
                    .service(get_blog_by_id)
                    .service(update_blog)
                    .service(delete_blog)
                    //Comment routes
                    .service(create_comment)
                    .service(get_comments),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
