//! tower-lsp based Language Server implementation.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_lsp::jsonrpc::{Error as RpcError, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};

use crate::model::{self, CompletionCandidate, Detail, HoverResult};
use crate::scheduler::RefreshOutcome;
use crate::Lens;

pub const REFRESH_COMMAND: &str = "deciderLens.refresh";

/// Shared state that can be cloned into spawned tasks via Arc.
struct State {
    client: Client,
    lens: Arc<Lens>,
    documents: DashMap<String, (i32, String)>,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl State {
    fn new(client: Client, lens: Arc<Lens>) -> Self {
        Self {
            client,
            lens,
            documents: DashMap::new(),
            refresher: Mutex::new(None),
        }
    }

    fn text(&self, uri: &Url) -> Option<String> {
        self.documents
            .get(uri.as_str())
            .map(|entry| entry.1.clone())
    }
}

fn to_position(pos: Position) -> model::Position {
    model::Position {
        line: pos.line as usize,
        character: pos.character as usize,
    }
}

fn completion_item(candidate: &CompletionCandidate) -> CompletionItem {
    CompletionItem {
        label: candidate.key.clone(),
        kind: Some(CompletionItemKind::TEXT),
        data: serde_json::to_value(candidate).ok(),
        ..Default::default()
    }
}

fn apply_detail(item: &mut CompletionItem, detail: Detail) {
    item.detail = Some(detail.summary);
    item.documentation = Some(Documentation::MarkupContent(MarkupContent {
        kind: MarkupKind::Markdown,
        value: detail.documentation,
    }));
}

fn to_hover(result: HoverResult) -> Hover {
    let line = result.range.line as u32;
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: result.documentation,
        }),
        range: Some(Range {
            start: Position {
                line,
                character: result.range.start as u32,
            },
            end: Position {
                line,
                character: result.range.end as u32,
            },
        }),
    }
}

/// Failures go to the client's log channel only, never a popup.
fn refresh_log_line(outcome: &RefreshOutcome) -> Option<String> {
    match outcome {
        RefreshOutcome::Failed { reason } => {
            Some(format!("Could not refresh decider data: {reason}"))
        }
        RefreshOutcome::Updated(_) | RefreshOutcome::Skipped => None,
    }
}

pub struct Backend {
    state: Arc<State>,
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, _: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(true),
                    trigger_characters: Some(vec!["'".to_string(), "\"".to_string()]),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![REFRESH_COMMAND.to_string()],
                    ..Default::default()
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "decider-lens".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let mut refresher = self.state.refresher.lock().await;
        if refresher.is_none() {
            *refresher = Some(self.state.lens.start());
        }
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(handle) = self.state.refresher.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.state
            .documents
            .insert(doc.uri.to_string(), (doc.version, doc.text));
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri.to_string();
        let version = params.text_document.version;

        if let Some(change) = params.content_changes.into_iter().last() {
            self.state.documents.insert(uri, (version, change.text));
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.state
            .documents
            .remove(params.text_document.uri.as_str());
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let doc = params.text_document_position;
        let Some(text) = self.state.text(&doc.text_document.uri) else {
            return Ok(None);
        };

        let items: Vec<CompletionItem> = self
            .state
            .lens
            .resolve_completions(&text, to_position(doc.position))
            .iter()
            .map(completion_item)
            .collect();

        Ok(if items.is_empty() {
            None
        } else {
            Some(CompletionResponse::Array(items))
        })
    }

    async fn completion_resolve(&self, mut item: CompletionItem) -> Result<CompletionItem> {
        let candidate = item
            .data
            .clone()
            .and_then(|data| serde_json::from_value::<CompletionCandidate>(data).ok());

        if let Some(candidate) = candidate {
            if let Some(detail) = self.state.lens.resolve_detail(&candidate).await {
                apply_detail(&mut item, detail);
            }
        }
        Ok(item)
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let doc = params.text_document_position_params;
        let Some(text) = self.state.text(&doc.text_document.uri) else {
            return Ok(None);
        };

        Ok(self
            .state
            .lens
            .resolve_hover(&text, to_position(doc.position))
            .await
            .map(to_hover))
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> Result<Option<serde_json::Value>> {
        if params.command != REFRESH_COMMAND {
            return Err(RpcError::invalid_params(format!(
                "unknown command: {}",
                params.command
            )));
        }

        let outcome = self.state.lens.refresh_now().await;
        if let Some(line) = refresh_log_line(&outcome) {
            self.state
                .client
                .log_message(MessageType::WARNING, line)
                .await;
        }
        Ok(serde_json::to_value(&outcome).ok())
    }
}

/// Start the LSP server on stdio.
pub async fn serve_stdio(lens: Lens) {
    let lens = Arc::new(lens);

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(|client| Backend {
        state: Arc::new(State::new(client, Arc::clone(&lens))),
    });
    Server::new(stdin, stdout, socket).serve(service).await;
}
