use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ServerHandler,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use calcpilot_agent::{Error, Session, SessionConfig, StepError, Token};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InstructionRequest {
    #[schemars(description = "Arithmetic in plain words, e.g. \"add 2 and 3 then square the result\"")]
    pub instruction: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ButtonRequest {
    #[schemars(description = "Button to press: a digit, + - × ÷ (or * /), =, square, or sqrt")]
    pub button: String,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

fn failure(e: &Error) -> Value {
    json!({ "success": false, "error": StepError::from(e) })
}

/// Wrap a payload; `"success": false` marks the tool result as an error.
fn respond(payload: Value) -> Result<CallToolResult, ErrorData> {
    let text = serde_json::to_string_pretty(&payload)
        .map_err(|e| ErrorData::internal_error(e.to_string(), None::<Value>))?;
    let content = vec![Content::text(text)];
    if payload["success"] == Value::Bool(false) {
        Ok(CallToolResult::error(content))
    } else {
        Ok(CallToolResult::success(content))
    }
}

#[derive(Clone)]
pub struct CalcServer {
    config: SessionConfig,
    session: Arc<Mutex<Option<Session>>>,
    tool_router: ToolRouter<Self>,
}

impl CalcServer {
    /// The session, created on first use.
    async fn session(&self) -> Result<MappedMutexGuard<'_, Session>, Error> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(Session::xdotool(self.config.clone())?);
        }
        MutexGuard::try_map(guard, |s| s.as_mut())
            .map_err(|_| Error::Backend("session unavailable".into()))
    }
}

#[tool_router]
impl CalcServer {
    /// Server whose session is built from `config` on the first tool call.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(None)),
            tool_router: Self::tool_router(),
        }
    }

    /// Server over an existing session.
    pub fn with(session: Session) -> Self {
        Self {
            config: session.config().clone(),
            session: Arc::new(Mutex::new(Some(session))),
            tool_router: Self::tool_router(),
        }
    }

    pub async fn open(&self) -> Value {
        let mut session = match self.session().await {
            Ok(s) => s,
            Err(e) => return failure(&e),
        };
        match session.ensure_open().await {
            Ok(report) => json!({
                "success": true,
                "launched": report.launched,
                "window": report.window,
            }),
            Err(e) => failure(&e),
        }
    }

    pub async fn calculate(&self, instruction: &str) -> Value {
        match self.session().await {
            Ok(mut session) => json!(session.execute(instruction).await),
            Err(e) => failure(&e),
        }
    }

    pub async fn press(&self, button: &str) -> Value {
        let token: Token = match button.parse() {
            Ok(t) => t,
            Err(e) => return failure(&e),
        };
        match self.session().await {
            Ok(mut session) => json!(session.click(token).await),
            Err(e) => failure(&e),
        }
    }

    pub async fn plan(&self, instruction: &str) -> Value {
        let sequence = match self.session().await {
            Ok(session) => session.plan(instruction),
            Err(e) => return failure(&e),
        };
        json!({
            "success": !sequence.is_empty(),
            "instruction": instruction,
            "sequence": sequence,
            "display": sequence.to_string(),
        })
    }

    pub async fn buttons(&self) -> Value {
        match self.session().await {
            Ok(session) => {
                let buttons = session.buttons();
                json!({ "success": true, "count": buttons.len(), "buttons": buttons })
            }
            Err(e) => failure(&e),
        }
    }

    #[tool(
        description = "Bring up the calculator. Reuses an already-open calculator window; launches the application only if none exists. Returns the window identity."
    )]
    async fn open_calculator(&self) -> Result<CallToolResult, ErrorData> {
        respond(self.open().await)
    }

    #[tool(
        description = "Perform arithmetic described in plain words by clicking calculator buttons, e.g. \"multiply 12 by 7\" or \"add 2 and 3 and then find the square of the result\". Returns the button sequence and the outcome of every click."
    )]
    async fn execute_calculation(
        &self,
        req: Parameters<InstructionRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(self.calculate(&req.0.instruction).await)
    }

    #[tool(description = "Click a single calculator button directly.")]
    async fn click_button(&self, req: Parameters<ButtonRequest>) -> Result<CallToolResult, ErrorData> {
        respond(self.press(&req.0.button).await)
    }

    #[tool(description = "Show the buttons an instruction would press, without clicking anything.")]
    async fn plan_calculation(
        &self,
        req: Parameters<InstructionRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(self.plan(&req.0.instruction).await)
    }

    #[tool(description = "List the buttons in the interface map and which tokens resolve to each.")]
    async fn list_buttons(&self) -> Result<CallToolResult, ErrorData> {
        respond(self.buttons().await)
    }
}

#[tool_handler]
impl ServerHandler for CalcServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "calcpilot".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Desktop calculator automation. Use 'open_calculator' first, then \
                 'execute_calculation' with plain-language arithmetic. 'click_button' presses \
                 one button; 'plan_calculation' previews the button sequence without clicking; \
                 'list_buttons' shows what the interface map contains. The result is on the \
                 calculator display, not in the response."
                    .into(),
            ),
        }
    }
}

pub async fn run_server(config: SessionConfig) -> anyhow::Result<()> {
    use rmcp::ServiceExt;

    let server = CalcServer::new(config);
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
