//! Line-delimited JSON service exposing `addText` and `ask`.

pub mod protocol;

use protocol::{AddTextParams, AskParams, Request, Response};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::error::{QnaError, Result};
use crate::service::QnaService;

pub struct QnaServer {
    service: QnaService,
}

impl QnaServer {
    pub fn new(service: QnaService) -> Self {
        Self { service }
    }

    /// Serve requests from stdin until EOF
    pub async fn run(&self) -> Result<()> {
        tracing::info!("qna service listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Handle each request line on its own task and write responses as they
    /// complete. Returns once input is exhausted and every in-flight request
    /// has been answered.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let writer_task = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let request: Request = match serde_json::from_str(&line) {
                Ok(req) => req,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse request");
                    continue;
                }
            };

            let service = self.service.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let response = handle_request(&service, request).await;
                match serde_json::to_string(&response) {
                    Ok(json) => {
                        // Receiver only goes away if the writer failed
                        let _ = tx.send(json);
                    }
                    Err(e) => tracing::error!(error = %e, "failed to serialize response"),
                }
            });
        }

        drop(tx);
        writer_task
            .await
            .map_err(|e| QnaError::Io(std::io::Error::other(e)))??;
        Ok(())
    }
}

pub async fn handle_request(service: &QnaService, request: Request) -> Response {
    tracing::debug!(method = %request.method, id = %request.id, "handling request");
    match request.method.as_str() {
        "addText" => handle_add_text(service, request.id, request.params).await,
        "ask" => handle_ask(service, request.id, request.params).await,
        _ => Response::error(
            request.id,
            404,
            format!("Method not found: {}", request.method),
        ),
    }
}

async fn handle_add_text(
    service: &QnaService,
    id: serde_json::Value,
    params: serde_json::Value,
) -> Response {
    let params: AddTextParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(_) => return Response::error(id, 400, "Text is required"),
    };

    match service.add_text(&params.text).await {
        Ok(added) => Response::success(id, json!(added)),
        Err(e) => failure(id, e),
    }
}

async fn handle_ask(
    service: &QnaService,
    id: serde_json::Value,
    params: serde_json::Value,
) -> Response {
    let params: AskParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(_) => return Response::error(id, 400, "Question is required"),
    };

    match service.ask(&params.question).await {
        Ok(answer) => Response::success(id, json!(answer)),
        Err(e) => failure(id, e),
    }
}

fn failure(id: serde_json::Value, e: QnaError) -> Response {
    tracing::error!(error = %e, "request failed");
    Response::error(id, e.status_code(), e.to_string())
}
