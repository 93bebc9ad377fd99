use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};

use crate::model::{
    InitialSearchResponse, SearchRequest, ShopDetailRequest, ShopDetailSearchResponse,
};
use crate::service::SearchService;

/// MCP surface over the same `SearchService` the HTTP API uses.
#[derive(Clone)]
pub struct ShopSearchServer {
    service: SearchService,
    tool_router: ToolRouter<ShopSearchServer>,
}

impl ShopSearchServer {
    pub fn new(service: SearchService) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl ShopSearchServer {
    #[tool(description = "Search the web for restaurants matching a free-text query and return up to 10 candidate shop names, together with the raw grounded answer.")]
    async fn initial_search(
        &self,
        Parameters(params): Parameters<SearchRequest>,
    ) -> Result<Json<InitialSearchResponse>, String> {
        let response = self
            .service
            .initial_search(&params.input_text)
            .await
            .map_err(|e| format!("Search failed: {e}"))?;
        Ok(Json(response))
    }

    #[tool(description = "For each shop name (in order), search its details and score how well it matches the original query from 1 to 5. Shops that fail are returned with score 1 and an error reason.")]
    async fn detail_search(
        &self,
        Parameters(params): Parameters<ShopDetailRequest>,
    ) -> Result<Json<ShopDetailSearchResponse>, String> {
        let response = self
            .service
            .detail_search(&params.input_text, params.shop_names)
            .await
            .map_err(|e| format!("Detail search failed: {e}"))?;
        Ok(Json(response))
    }
}

#[tool_handler]
impl ServerHandler for ShopSearchServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "shop-search".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Restaurant search backed by {} with web grounding. Call initial_search with a \
query to get candidate shop names, then detail_search with the same query and the shops \
to score.",
                self.service.model_name()
            )),
        }
    }
}
