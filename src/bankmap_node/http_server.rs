use super::routes::{
    bank_routes, config_routes, dictionary_routes, function_routes, log_routes, protocol_routes,
    rule_routes, transform_routes,
};
use crate::bankmap_node::BankMapNode;
use crate::error::{MapError, MapResult};

use actix_cors::Cors;
use actix_web::{web, App, HttpServer as ActixHttpServer};
use log::info;
use std::sync::Arc;

/// HTTP server for a mapping node.
///
/// Serves the REST API under `/api`. The node is shared without a global
/// lock; each component serializes its own writes.
pub struct BankMapHttpServer {
    node: Arc<BankMapNode>,
    bind_address: String,
}

/// Shared application state for the HTTP server.
pub struct AppState {
    pub node: Arc<BankMapNode>,
}

impl BankMapHttpServer {
    pub fn new(node: BankMapNode, bind_address: &str) -> Self {
        Self {
            node: Arc::new(node),
            bind_address: bind_address.to_string(),
        }
    }

    /// Binds and serves until the server is stopped.
    ///
    /// # Errors
    ///
    /// Returns `MapError::Config` when the address cannot be bound.
    pub async fn run(&self) -> MapResult<()> {
        info!("HTTP server running on {}", self.bind_address);

        let app_state = web::Data::new(AppState {
            node: self.node.clone(),
        });

        let server = ActixHttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(app_state.clone())
                .configure(configure_api)
        })
        .bind(&self.bind_address)
        .map_err(|e| MapError::Config(format!("Failed to bind HTTP server: {}", e)))?
        .run();

        server
            .await
            .map_err(|e| MapError::Config(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}

/// Registers every route under `/api`. Static segments are registered
/// before `{id}` patterns that would otherwise capture them.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Legacy rules
            .route("/rules", web::get().to(rule_routes::list_rules))
            .route("/rules", web::post().to(rule_routes::save_rule))
            .route(
                "/rules/transform",
                web::post().to(rule_routes::transform_with_rule),
            )
            .route("/rules/{id}", web::get().to(rule_routes::get_rule))
            .route("/rules/{id}", web::delete().to(rule_routes::delete_rule))
            // Functions
            .route("/functions", web::get().to(function_routes::list_all_functions))
            .route("/v2/function/list", web::get().to(function_routes::list_functions))
            .route("/v2/function/save", web::post().to(function_routes::save_function))
            .route(
                "/v2/function/check-code",
                web::get().to(function_routes::check_function_code),
            )
            .route(
                "/v2/function/invoke",
                web::post().to(function_routes::invoke_function),
            )
            .route("/v2/function/{id}", web::get().to(function_routes::get_function))
            .route(
                "/v2/function/{id}",
                web::delete().to(function_routes::delete_function),
            )
            .route(
                "/v2/function/{id}/toggle-enabled",
                web::post().to(function_routes::toggle_function),
            )
            // Transforms
            .route("/v2/transform", web::post().to(transform_routes::transform_inline))
            .route(
                "/v2/transform/by-name",
                web::post().to(transform_routes::transform_by_name),
            )
            .route(
                "/v2/transform/by-config",
                web::post().to(transform_routes::transform_by_config),
            )
            .route(
                "/v2/transform/by-scope",
                web::post().to(transform_routes::transform_by_scope),
            )
            // Mapping configs
            .route("/v2/config/save", web::post().to(config_routes::save_config))
            .route("/v2/config/list", web::get().to(config_routes::list_configs))
            .route(
                "/v2/config/current",
                web::get().to(config_routes::get_current_config),
            )
            .route(
                "/v2/config/by-version",
                web::get().to(config_routes::get_config_by_version),
            )
            .route(
                "/v2/config/versions",
                web::get().to(config_routes::list_config_versions),
            )
            .route("/v2/config/rollback", web::post().to(config_routes::rollback_config))
            .route(
                "/v2/config/toggle-enabled/{id}",
                web::post().to(config_routes::toggle_config),
            )
            .route("/v2/config/{id}", web::get().to(config_routes::get_config))
            .route("/v2/config/{id}", web::delete().to(config_routes::delete_config))
            // Dictionaries
            .route(
                "/v2/dictionary/list",
                web::get().to(dictionary_routes::list_dictionaries),
            )
            .route(
                "/v2/dictionary/save",
                web::post().to(dictionary_routes::save_dictionary),
            )
            .route(
                "/v2/dictionary/check-code",
                web::get().to(dictionary_routes::check_dictionary_code),
            )
            .route(
                "/v2/dictionary/{id}",
                web::get().to(dictionary_routes::get_dictionary),
            )
            .route(
                "/v2/dictionary/{id}",
                web::delete().to(dictionary_routes::delete_dictionary),
            )
            // Banks
            .route("/v2/bank/list", web::get().to(bank_routes::list_banks))
            .route(
                "/v2/bank/list/enabled",
                web::get().to(bank_routes::list_enabled_banks),
            )
            .route("/v2/bank/save", web::post().to(bank_routes::save_bank))
            .route("/v2/bank/check-code", web::get().to(bank_routes::check_bank_code))
            .route("/v2/bank/{id}", web::get().to(bank_routes::get_bank))
            .route("/v2/bank/{id}", web::delete().to(bank_routes::delete_bank))
            .route(
                "/v2/bank/{id}/export-plugin",
                web::get().to(bank_routes::export_plugin),
            )
            // Transaction types
            .route(
                "/v2/transaction-type/presets",
                web::get().to(bank_routes::list_transaction_type_presets),
            )
            .route(
                "/v2/transaction-type/save",
                web::post().to(bank_routes::save_transaction_type),
            )
            .route(
                "/v2/transaction-type/by-bank/{bank_id}",
                web::get().to(bank_routes::list_transaction_types),
            )
            .route(
                "/v2/transaction-type/{id}",
                web::get().to(bank_routes::get_transaction_type),
            )
            .route(
                "/v2/transaction-type/{id}",
                web::delete().to(bank_routes::delete_transaction_type),
            )
            // Standard protocols
            .route("/standard-protocol", web::get().to(protocol_routes::list_protocols))
            .route("/standard-protocol", web::post().to(protocol_routes::save_protocol))
            .route(
                "/standard-protocol/by-type",
                web::get().to(protocol_routes::list_protocols_by_type),
            )
            .route(
                "/standard-protocol/import-from-document",
                web::post().to(protocol_routes::import_from_document),
            )
            .route(
                "/standard-protocol/{id}",
                web::get().to(protocol_routes::get_protocol),
            )
            .route(
                "/standard-protocol/{id}",
                web::delete().to(protocol_routes::delete_protocol),
            )
            .route(
                "/standard-protocol/{id}/toggle-enabled",
                web::post().to(protocol_routes::toggle_protocol),
            )
            // Logs
            .route("/logs", web::get().to(log_routes::list_logs))
            .route("/logs/stream", web::get().to(log_routes::stream_logs)),
    );
}
