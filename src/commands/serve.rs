use qna::error::{QnaError, Result};
use qna::server::QnaServer;
use qna::Config;

use super::open_service;

pub fn cmd_serve(config: &Config, ephemeral: bool) -> Result<()> {
    let service = open_service(config, ephemeral)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| QnaError::Config(format!("tokio runtime: {}", e)))?;

    rt.block_on(QnaServer::new(service).run())
}
