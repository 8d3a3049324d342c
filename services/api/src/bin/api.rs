//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{Db, DbClock, S3BlobStore, StaticTokenAuth},
    config::Config,
    error::ApiError,
    web::{
        middleware::require_admin,
        rest::{
            self, ApiDoc,
        },
        state::AppState,
    },
};
use aws_credential_types::Credentials;
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use cohort_core::{
    AccessGate, CompletionService, RefundService, ScheduleService, SubmissionService,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db = Db::new(db_pool.clone());
    info!("Running database migrations...");
    db.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Adapters ---
    let challenges = Arc::new(db.challenges());
    let lectures = Arc::new(db.lectures());
    let slots = Arc::new(db.slots());
    let assignments = Arc::new(db.assignments());
    let enrollments = Arc::new(db.enrollments());
    let submissions = Arc::new(db.submissions());

    // The database is also the authoritative clock, so deadline checks
    // never trust a caller's machine time.
    let clock = Arc::new(DbClock::new(db_pool.clone()));
    let storage = Arc::new(S3BlobStore::new(
        config.s3_bucket.clone(),
        config.s3_region.clone(),
        config.s3_endpoint.clone(),
        Credentials::from_keys(
            config.s3_access_key.clone(),
            config.s3_secret_key.clone(),
            None,
        ),
        config.s3_public_base_url.clone(),
    ));
    let auth = Arc::new(StaticTokenAuth::new(config.admin_token.clone()));

    // --- 4. Build the Engine Services & Shared AppState ---
    let gate = AccessGate::new(clock);
    let schedule = ScheduleService::new(challenges.clone(), lectures.clone(), slots.clone());
    let registry = SubmissionService::new(
        slots.clone(),
        submissions.clone(),
        gate.clone(),
        storage,
    );
    let completion = CompletionService::new(
        challenges.clone(),
        slots.clone(),
        assignments,
        enrollments.clone(),
        submissions,
    );
    let refunds = RefundService::new(completion.clone(), enrollments.clone());

    let app_state = Arc::new(AppState {
        config: config.clone(),
        auth,
        gate,
        challenges,
        lectures,
        slots,
        enrollments,
        schedule,
        registry,
        completion,
        refunds,
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Admin routes (schedule mutation and cohort review)
    let admin_routes = Router::new()
        .route("/challenges", post(rest::create_challenge_handler))
        .route(
            "/challenges/{challenge_id}/schedule",
            put(rest::reschedule_challenge_handler),
        )
        .route("/lectures", post(rest::create_lecture_handler))
        .route(
            "/challenges/{challenge_id}/lectures",
            post(rest::attach_lecture_handler),
        )
        .route(
            "/challenges/{challenge_id}/completion",
            get(rest::completion_matrix_handler),
        )
        .route(
            "/challenges/{challenge_id}/submission-rates",
            get(rest::submission_rates_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ));

    // Learner routes (identity via the x-user-id header)
    let learner_routes = Router::new()
        .route(
            "/challenges/{challenge_id}/enrollments",
            post(rest::enroll_handler),
        )
        .route(
            "/challenges/{challenge_id}/slots",
            get(rest::list_slots_handler),
        )
        .route("/slots/{slot_id}", get(rest::view_lecture_handler))
        .route("/slots/{slot_id}/submissions", post(rest::submit_handler))
        .route(
            "/slots/{slot_id}/submissions/me",
            get(rest::my_submission_handler),
        )
        .route("/submissions/{submission_id}", put(rest::amend_handler))
        .route(
            "/submissions/{submission_id}",
            delete(rest::delete_submission_handler),
        )
        .route(
            "/challenges/{challenge_id}/refund",
            get(rest::refund_eligibility_handler),
        )
        .route(
            "/challenges/{challenge_id}/refund",
            post(rest::request_refund_handler),
        );

    // Combine API routes
    let api_router = Router::new()
        .merge(admin_routes)
        .merge(learner_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
