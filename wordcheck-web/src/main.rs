//! Servidor web Axum para submeter manuscritos, acompanhar a verificação em
//! tempo real (WebSocket) e baixar a planilha gerada.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use askama::Template;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Multipart, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wordcheck_core::{
    corpus::demo_texts,
    delivery::{channel_from_settings, validate_recipient, DeliveryChannel, MailAttachment, ReportMail},
    error::DeliveryError,
    report::{StyledRow, TierSummary},
    Error, ManuscriptInput, Pipeline, PipelineEvent, PipelineFailure, PipelineOutcome, Settings,
    LOW_THRESHOLD,
};

const INPUT_ERROR: &str = "入力内容を確認してください";
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Estado compartilhado da aplicação
struct AppState {
    pipeline: Pipeline,
    delivery: Box<dyn DeliveryChannel>,
    settings: Settings,
    /// A planilha tem caminho fixo: uma execução por vez.
    run_lock: Mutex<()>,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    news_site: &'a str,
    low_threshold: u64,
    delivery: &'a str,
}

/// Mensagem WebSocket recebida do cliente
#[derive(Deserialize)]
struct WsRequest {
    text: String,
    #[serde(default)]
    address: Option<String>,
}

impl WsRequest {
    /// Endereço validado; vazio significa "sem envio".
    fn recipient(&self) -> Result<Option<String>, DeliveryError> {
        match self.address.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(address) => validate_recipient(address).map(Some),
        }
    }
}

#[derive(Serialize)]
struct CheckResponse {
    rows: Vec<StyledRow>,
    summary: TierSummary,
    export_path: String,
    processing_ms: u64,
    delivery: DeliveryReceipt,
}

#[derive(Serialize)]
struct DeliveryReceipt {
    channel: String,
    id: String,
}

/// Erro de API com status HTTP e corpo `{"error": ...}`.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<PipelineFailure> for ApiError {
    fn from(failure: PipelineFailure) -> Self {
        let status = match &failure.source {
            Error::Ingest(_) => StatusCode::BAD_REQUEST,
            Error::Oracle(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: failure.to_string(),
        }
    }
}

impl From<DeliveryError> for ApiError {
    fn from(err: DeliveryError) -> Self {
        let status = match err {
            DeliveryError::MissingRecipient | DeliveryError::Address(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Falha na requisição");
        }
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::load()?;
    let pipeline = Pipeline::from_settings(&settings)?;
    let delivery = channel_from_settings(&settings.mail)?;
    info!(channel = delivery.name(), "Canal de entrega configurado");

    let bind = settings.server.bind.clone();
    let state = Arc::new(AppState {
        pipeline,
        delivery,
        settings,
        run_lock: Mutex::new(()),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/check", post(check_handler))
        .route("/report", get(report_handler))
        .route("/ws", get(ws_handler))
        .route("/demo-texts", get(demo_texts_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(bind = %bind, "Servidor de verificação iniciado");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Retorna a página principal HTML
async fn index_handler(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let page = IndexTemplate {
        news_site: &state.settings.mail.news_site,
        low_threshold: LOW_THRESHOLD,
        delivery: state.delivery.name(),
    };
    page.render()
        .map(Html)
        .map_err(|e| ApiError::internal(format!("falha ao renderizar página: {e}")))
}

/// Campos do formulário multipart.
#[derive(Default)]
struct CheckForm {
    text: String,
    file: Option<(String, Vec<u8>)>,
    address: String,
}

impl CheckForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = CheckForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text" => {
                    form.text = field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?;
                }
                "address" => {
                    form.address = field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?;
                }
                "file" => {
                    let name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.to_string()))?;
                    // Navegadores enviam o campo vazio quando nada foi escolhido.
                    if !name.is_empty() && !bytes.is_empty() {
                        form.file = Some((name, bytes.to_vec()));
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }

    /// O arquivo tem precedência sobre o texto.
    fn into_input(self) -> Result<(ManuscriptInput, String), ApiError> {
        let address = validate_recipient(&self.address).map_err(|e| match e {
            DeliveryError::MissingRecipient => ApiError::bad_request(INPUT_ERROR),
            other => ApiError::bad_request(other.to_string()),
        })?;
        let input = match self.file {
            Some((name, bytes)) => ManuscriptInput::document(name, bytes),
            None if !self.text.trim().is_empty() => ManuscriptInput::text(self.text),
            None => return Err(ApiError::bad_request(INPUT_ERROR)),
        };
        Ok((input, address))
    }
}

/// Verificação completa via HTTP POST: pipeline + envio do e-mail.
async fn check_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (input, address) = CheckForm::read(multipart).await?.into_input()?;
    info!(
        source = match &input {
            ManuscriptInput::Text(_) => "text",
            ManuscriptInput::Document { .. } => "file",
        },
        "Verificação solicitada"
    );

    let worker = Arc::clone(&state);
    let (outcome, receipt) = tokio::task::spawn_blocking(move || {
        let _guard = worker.run_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let ManuscriptInput::Document { name, bytes } = &input {
            save_upload(&worker.settings.server.upload_dir, name, bytes);
        }
        let source = MailAttachment::source(&input);
        let outcome = worker.pipeline.run(input)?;
        let receipt = deliver(&worker, &address, source, &outcome)?;
        Ok::<_, ApiError>((outcome, receipt))
    })
    .await
    .map_err(|e| ApiError::internal(format!("tarefa interrompida: {e}")))??;

    let body = CheckResponse {
        rows: outcome.report.styled_rows().collect(),
        summary: outcome.report.summary(),
        export_path: outcome.export_path.display().to_string(),
        processing_ms: outcome.processing_ms,
        delivery: receipt,
    };
    Ok(Json(body).into_response())
}

/// Compõe e envia o e-mail com o manuscrito e a planilha.
fn deliver(
    state: &AppState,
    address: &str,
    source: MailAttachment,
    outcome: &PipelineOutcome,
) -> Result<DeliveryReceipt, DeliveryError> {
    let report = MailAttachment::report(&outcome.export_path)?;
    let mail = ReportMail::compose(address, &state.settings.mail, source, report)?;
    let id = state.delivery.deliver(&mail)?;
    Ok(DeliveryReceipt {
        channel: state.delivery.name().to_string(),
        id,
    })
}

/// Guarda uma cópia do arquivo enviado. Falhas aqui não interrompem a verificação.
fn save_upload(dir: &Path, name: &str, bytes: &[u8]) {
    let Some(file_name) = Path::new(name).file_name() else {
        return;
    };
    let path: PathBuf = dir.join(file_name);
    let result = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, bytes));
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Não foi possível guardar o arquivo enviado");
    }
}

/// Download da última planilha exportada.
async fn report_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let path = state.pipeline.export_path();
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError {
                status: StatusCode::NOT_FOUND,
                message: "nenhuma planilha gerada ainda".into(),
            });
        }
        Err(e) => return Err(ApiError::internal(e.to_string())),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "caution_words.xlsx".to_string());
    let disposition = format!("attachment; filename=\"{file_name}\"");
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Retorna textos de demonstração
async fn demo_texts_handler() -> impl IntoResponse {
    let texts: Vec<serde_json::Value> = demo_texts()
        .iter()
        .map(|(domain, text)| {
            serde_json::json!({
                "domain": domain,
                "text": text
            })
        })
        .collect();
    Json(texts)
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Lógica do WebSocket: recebe o texto, executa o pipeline e repassa cada
/// evento assim que ele é emitido.
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(raw) => {
                // JSON {text, address}; senão o texto puro
                let request = serde_json::from_str::<WsRequest>(&raw).unwrap_or(WsRequest {
                    text: raw.to_string(),
                    address: None,
                });
                if request.text.trim().is_empty() {
                    continue;
                }
                let recipient = match request.recipient() {
                    Ok(recipient) => recipient,
                    Err(e) => {
                        warn!(error = %e, "Endereço rejeitado antes da execução");
                        let rejected = serde_json::json!({ "type": "DeliveryFailed", "data": { "message": e.to_string() } });
                        if socket.send(Message::Text(rejected.to_string().into())).await.is_err() {
                            return;
                        }
                        continue;
                    }
                };
                info!(chars = request.text.chars().count(), "Verificando via WebSocket");

                if !stream_run(&mut socket, &state, request.text, recipient).await {
                    return; // cliente desconectou
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}

/// Executa uma verificação repassando os eventos. `false` se o cliente saiu.
async fn stream_run(
    socket: &mut WebSocket,
    state: &Arc<AppState>,
    text: String,
    recipient: Option<String>,
) -> bool {
    let (tx_std, rx_std) = std::sync::mpsc::channel::<PipelineEvent>();
    let (tx_async, mut rx_async) = tokio::sync::mpsc::unbounded_channel::<PipelineEvent>();

    // Ponte: o pipeline é síncrono e emite por std::mpsc.
    let bridge = tokio::task::spawn_blocking(move || {
        for event in rx_std {
            if tx_async.send(event).is_err() {
                break;
            }
        }
    });

    let worker = Arc::clone(state);
    let input = ManuscriptInput::text(text);
    let run = tokio::task::spawn_blocking(move || {
        let _guard = worker.run_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let source = MailAttachment::source(&input);
        let outcome = worker.pipeline.run_streaming(input, tx_std).ok()?;
        let address = recipient?;
        Some(deliver(&worker, &address, source, &outcome).map_err(|e| e.to_string()))
    });

    while let Some(event) = rx_async.recv().await {
        if let Ok(json) = serde_json::to_string(&event) {
            if socket.send(Message::Text(json.into())).await.is_err() {
                return false;
            }
        }
    }
    let _ = bridge.await;

    let delivered = match run.await {
        Ok(Some(Ok(receipt))) => serde_json::json!({ "type": "Delivered", "data": receipt }),
        Ok(Some(Err(message))) => serde_json::json!({ "type": "DeliveryFailed", "data": { "message": message } }),
        Ok(None) => return true,
        Err(e) => serde_json::json!({ "type": "DeliveryFailed", "data": { "message": e.to_string() } }),
    };
    socket.send(Message::Text(delivered.to_string().into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(text: &str, file: Option<(&str, &[u8])>, address: &str) -> CheckForm {
        CheckForm {
            text: text.to_string(),
            file: file.map(|(n, b)| (n.to_string(), b.to_vec())),
            address: address.to_string(),
        }
    }

    #[test]
    fn test_file_takes_precedence_over_text() {
        let (input, address) = form("本文", Some(("原稿.txt", "ファイル".as_bytes())), " a@b.jp ")
            .into_input()
            .ok()
            .unwrap();
        assert_eq!(address, "a@b.jp");
        assert!(matches!(input, ManuscriptInput::Document { name, .. } if name == "原稿.txt"));
    }

    #[test]
    fn test_missing_inputs_are_rejected() {
        for f in [form("本文", None, ""), form("  ", None, "a@b.jp")] {
            let err = f.into_input().err().unwrap();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert_eq!(err.message, INPUT_ERROR);
        }
    }

    #[test]
    fn test_malformed_address_rejected_before_run() {
        for address in ["editor@", "not-an-address"] {
            let err = form("本文", None, address).into_input().err().unwrap();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert_ne!(err.message, INPUT_ERROR);
        }
    }

    #[test]
    fn test_ws_recipient() {
        let request = |address: Option<&str>| WsRequest {
            text: "本文".into(),
            address: address.map(str::to_string),
        };
        assert_eq!(request(None).recipient().ok().unwrap(), None);
        assert_eq!(request(Some("  ")).recipient().ok().unwrap(), None);
        assert_eq!(
            request(Some(" a@b.jp ")).recipient().ok().unwrap(),
            Some("a@b.jp".to_string())
        );
        assert!(matches!(request(Some("editor@")).recipient(), Err(DeliveryError::Address(_))));
    }

    #[test]
    fn test_delivery_error_status() {
        assert_eq!(
            ApiError::from(DeliveryError::MissingRecipient).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(DeliveryError::Message("x".into())).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_pipeline_failure_status() {
        use wordcheck_core::{error::IngestError, PipelineState};
        let failure = |source: Error| PipelineFailure {
            stage: PipelineState::Extracted,
            source,
        };
        let oracle = failure(Error::Oracle(wordcheck_core::OracleError::EmptyTerm));
        assert_eq!(ApiError::from(oracle).status, StatusCode::BAD_GATEWAY);
        let ingest = failure(Error::Ingest(IngestError::UnsupportedFormat("a.pdf".into())));
        assert_eq!(ApiError::from(ingest).status, StatusCode::BAD_REQUEST);
    }
}
