//! Binary rendering of generated prose.
//!
//! Two formats exist: PDF (compiled with the Typst CLI) and DOCX
//! (converted with Pandoc). Both go through a temp directory per render so
//! concurrent renders never share compilation state.

use async_trait::async_trait;
use std::path::Path;
use tempfile::tempdir;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("failed to write render source: {0}")]
    WriteSource(#[source] std::io::Error),
    #[error("{tool} execution failed: {source}")]
    ToolIo {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with status {code}")]
    ToolExit { tool: &'static str, code: i32 },
    #[error("failed to read rendered output: {0}")]
    ReadOutput(#[source] std::io::Error),
}

/// Output format of one artifact slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Pdf,
    Docx,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Pdf => "pdf",
            ArtifactFormat::Docx => "docx",
        }
    }
}

/// Structured text ready for rendering.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Document title, shown as the heading of the rendered file.
    pub title: String,
    /// Generated prose body.
    pub body: String,
}

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(
        &self,
        request: &RenderRequest,
        format: ArtifactFormat,
    ) -> Result<Vec<u8>, RenderError>;
}

/// Renderer shelling out to the Typst and Pandoc CLIs.
pub struct CliRenderEngine;

#[async_trait]
impl DocumentRenderer for CliRenderEngine {
    async fn render(
        &self,
        request: &RenderRequest,
        format: ArtifactFormat,
    ) -> Result<Vec<u8>, RenderError> {
        match format {
            ArtifactFormat::Pdf => render_pdf(request).await,
            ArtifactFormat::Docx => render_docx(request).await,
        }
    }
}

async fn render_pdf(request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
    let temp_dir = tempdir().map_err(RenderError::TempDir)?;
    let source_path = temp_dir.path().join("document.typ");
    let output_path = temp_dir.path().join("document.pdf");

    tokio::fs::write(&source_path, typst_source(request))
        .await
        .map_err(RenderError::WriteSource)?;

    run_tool(
        "typst",
        Command::new("typst")
            .arg("compile")
            .arg(&source_path)
            .arg(&output_path)
            .current_dir(temp_dir.path()),
    )
    .await?;

    read_output(&output_path).await
}

async fn render_docx(request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
    let temp_dir = tempdir().map_err(RenderError::TempDir)?;
    let source_path = temp_dir.path().join("document.md");
    let output_path = temp_dir.path().join("document.docx");

    tokio::fs::write(&source_path, markdown_source(request))
        .await
        .map_err(RenderError::WriteSource)?;

    run_tool(
        "pandoc",
        Command::new("pandoc")
            .arg(&source_path)
            .arg("-o")
            .arg(&output_path)
            .current_dir(temp_dir.path()),
    )
    .await?;

    read_output(&output_path).await
}

async fn run_tool(tool: &'static str, command: &mut Command) -> Result<(), RenderError> {
    let status = command
        .status()
        .await
        .map_err(|source| RenderError::ToolIo { tool, source })?;
    if !status.success() {
        return Err(RenderError::ToolExit {
            tool,
            code: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

async fn read_output(path: &Path) -> Result<Vec<u8>, RenderError> {
    tokio::fs::read(path).await.map_err(RenderError::ReadOutput)
}

/// Minimal Typst wrapper: title heading plus the prose body.
fn typst_source(request: &RenderRequest) -> String {
    format!(
        "#set page(margin: 2.5cm)\n#set text(size: 11pt)\n\n= {}\n\n{}\n",
        escape_typst(&request.title),
        escape_typst(&request.body)
    )
}

fn markdown_source(request: &RenderRequest) -> String {
    format!("# {}\n\n{}\n", request.title, request.body)
}

/// Escape characters Typst treats as markup.
fn escape_typst(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' | '#' | '*' | '_' | '$' | '@' | '<' | '>' | '[' | ']' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}
