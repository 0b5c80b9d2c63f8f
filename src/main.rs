use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use clap_serde_derive::ClapSerde;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::error::ApiResult;
use crate::inference::generation_config::GenerationConfig;
use crate::inference::models::model::ModelBase;
use crate::recipe::format::Block;
use crate::recipe::service::{GeneratedRecipe, RecipeService};
use crate::telemetry::init_telemetry;

mod config;
mod error;
mod inference;
mod recipe;
mod telemetry;

#[cfg(unix)]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

#[derive(Deserialize, Debug)]
struct RecipeRequest {
    ingredients: String,
}

#[derive(Deserialize, Debug)]
struct BatchRecipeRequest {
    ingredients: Vec<String>,
}

#[derive(Serialize, Debug)]
struct RecipeResponse {
    /// The recipe rendered for display
    recipe: String,
    blocks: Vec<Block>,
    raw: Vec<String>,
    inference_time: f64,
}

impl From<GeneratedRecipe> for RecipeResponse {
    fn from(generated: GeneratedRecipe) -> Self {
        RecipeResponse {
            recipe: generated.recipe.to_string(),
            blocks: generated.recipe.blocks,
            raw: generated.raw,
            inference_time: generated.inference_time,
        }
    }
}

#[derive(Serialize, Debug)]
struct ModelResponse {
    model: ModelBase,
    generation: GenerationConfig,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    init_telemetry();

    let args = Args::parse();
    let config = match Config::load(&args.config_file, args.opt_config) {
        Ok(config) => config,
        Err(err) => exit_err!(1, "{:#}", err),
    };
    let address = format!("{}:{}", config.address, config.port);

    info!(
        "Supported features: avx: {}, neon: {}, simd128: {}, f16c: {}",
        candle_core::utils::with_avx(),
        candle_core::utils::with_neon(),
        candle_core::utils::with_simd128(),
        candle_core::utils::with_f16c()
    );
    let service = match tokio::task::spawn_blocking(move || RecipeService::load(&config)).await? {
        Ok(service) => Arc::new(service),
        Err(err) => exit_err!(1, "Failed to load the model: {:#}", err),
    };

    let listener = TcpListener::bind(address).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn router(service: Arc<RecipeService>) -> Router {
    Router::new()
        .route("/recipe", post(handle_recipe_request))
        .route("/recipe/batch", post(handle_batch_recipe_request))
        .route("/model", get(handle_model_request))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down..."),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}

#[axum_macros::debug_handler]
async fn handle_recipe_request(
    State(service): State<Arc<RecipeService>>,
    Json(req): Json<RecipeRequest>,
) -> ApiResult<(StatusCode, Json<RecipeResponse>)> {
    let generated =
        tokio::task::spawn_blocking(move || service.generate_recipe(&req.ingredients)).await??;
    Ok((StatusCode::OK, Json(generated.into())))
}

#[axum_macros::debug_handler]
async fn handle_batch_recipe_request(
    State(service): State<Arc<RecipeService>>,
    Json(req): Json<BatchRecipeRequest>,
) -> ApiResult<(StatusCode, Json<RecipeResponse>)> {
    let generated =
        tokio::task::spawn_blocking(move || service.generate_recipes(&req.ingredients)).await??;
    Ok((StatusCode::OK, Json(generated.into())))
}

#[axum_macros::debug_handler]
async fn handle_model_request(
    State(service): State<Arc<RecipeService>>,
) -> (StatusCode, Json<ModelResponse>) {
    (
        StatusCode::OK,
        Json(ModelResponse {
            model: service.model().clone(),
            generation: *service.generation_config(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use tower::ServiceExt;

    use super::*;
    use crate::recipe::service::tests::{test_service, PANCAKES, PANCAKES_RECIPE};

    fn test_router() -> Router {
        router(Arc::new(test_service(&PANCAKES)))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_recipe_request() {
        let response = test_router()
            .oneshot(post_json(
                "/recipe",
                serde_json::json!({ "ingredients": "eggs, flour, milk\n" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["recipe"], PANCAKES_RECIPE);
        assert_eq!(body["raw"].as_array().unwrap().len(), 1);
        assert_eq!(body["blocks"][0]["header"], "recipe");
        assert_eq!(body["blocks"][0]["content"]["title"], "Pancakes");
        assert_eq!(
            body["blocks"][1]["content"]["list"],
            serde_json::json!(["2 cups flour", "Eggs"])
        );
    }

    #[tokio::test]
    async fn test_batch_request() {
        let response = test_router()
            .oneshot(post_json(
                "/recipe/batch",
                serde_json::json!({ "ingredients": ["eggs", "milk"] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["raw"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let response = test_router()
            .oneshot(post_json(
                "/recipe/batch",
                serde_json::json!({ "ingredients": [] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "At least one list of ingredients is required"
        );
    }

    #[tokio::test]
    async fn test_model_request() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/model")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["model"]["repo_id"], "stub/t5");
        assert_eq!(body["generation"]["strategy"], "sampling");
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
