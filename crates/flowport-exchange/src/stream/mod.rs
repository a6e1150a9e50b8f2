//! Parser for documents arriving as a byte stream.
//!
//! Chunks are read ahead by a background task into a bounded channel. Each
//! chunk is fed to the [`Tokenizer`]; values it recognizes by path are
//! claimed (detached from the tree) and then handled one by one, including
//! any image verification they need, before the next chunk is fed. The
//! document tree is therefore never held in full.

mod tokenizer;

pub use tokenizer::{PathSegment, Tokenizer, ValueEvent};

use flowport_config::ImportConfig;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::document::{IMAGES, ImportPolicy, VERSION, WORKFLOWS, declares_images, parse_image_map};
use crate::progress::ProgressTracker;
use crate::state::{ImportResult, ParsingState};
use crate::verifier::ImageVerifier;
use crate::{ExchangeError, Result};

/// A structurally significant value taken out of the document tree.
#[derive(Debug)]
enum Claim {
    Version(Value),
    Workflows(Value),
    Images(Value),
    Workflow { index: usize, value: Value },
    WorkflowImages { index: usize, value: Value },
    ImageFile { hash: String, value: Value },
}

/// Decide what to do with a completed value.
///
/// Workflow image maps are copied and stay attached, so the workflow entry
/// they belong to still carries them when it completes. Only object-valued
/// maps are claimed; anything else is left to the workflow entry check.
fn claim(event: ValueEvent<'_>, pending: &mut Vec<Claim>) -> Option<Value> {
    use PathSegment::{Index, Key};

    let claimed = match event.path {
        [Key(key)] if key == VERSION => Claim::Version(event.value),
        [Key(key)] if key == WORKFLOWS => Claim::Workflows(event.value),
        [Key(key)] if key == IMAGES => Claim::Images(event.value),
        [Key(key), Index(index)] if key == WORKFLOWS => Claim::Workflow {
            index: *index,
            value: event.value,
        },
        [Key(key), Index(index), Key(field)]
            if key == WORKFLOWS && field == IMAGES && event.value.is_object() =>
        {
            pending.push(Claim::WorkflowImages {
                index: *index,
                value: event.value.clone(),
            });
            return Some(event.value);
        }
        [Key(key), Key(hash)] if key == IMAGES => Claim::ImageFile {
            hash: hash.clone(),
            value: event.value,
        },
        _ => return Some(event.value),
    };
    pending.push(claimed);
    None
}

/// Aborts the read-ahead task when parsing stops early.
struct ReadAhead(JoinHandle<()>);

impl Drop for ReadAhead {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Incremental parser for streamed documents.
#[derive(Debug, Clone)]
pub struct StreamingParser {
    policy: ImportPolicy,
    verifier: ImageVerifier,
    chunk_size: usize,
    read_ahead_chunks: usize,
}

impl StreamingParser {
    pub fn new(policy: ImportPolicy, verifier: ImageVerifier) -> Self {
        let defaults = ImportConfig::default();
        Self {
            policy,
            verifier,
            chunk_size: defaults.chunk_size,
            read_ahead_chunks: defaults.read_ahead_chunks,
        }
    }

    pub fn from_config(config: &ImportConfig, verifier: ImageVerifier) -> Self {
        Self::new(ImportPolicy::from(config), verifier)
            .with_chunk_size(config.chunk_size)
            .with_read_ahead(config.read_ahead_chunks)
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn with_read_ahead(mut self, chunks: usize) -> Self {
        self.read_ahead_chunks = chunks.max(1);
        self
    }

    pub async fn parse<R>(&self, reader: R, progress: &ProgressTracker) -> Result<ImportResult>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (mut chunks, _read_ahead) = self.spawn_reader(reader);
        let mut tokenizer = Tokenizer::new();
        let mut state = ParsingState::new();
        let mut pending = Vec::new();

        // Values completed before a syntax error are handled first, so the
        // reported error does not depend on chunk boundaries.
        while let Some(chunk) = chunks.recv().await {
            let chunk = chunk?;
            let written = tokenizer.write(&chunk, &mut |event| claim(event, &mut pending));
            self.handle_pending(&mut pending, &mut state, progress).await?;
            written?;
        }
        let ended = tokenizer.end(&mut |event| claim(event, &mut pending));
        self.handle_pending(&mut pending, &mut state, progress).await?;
        ended?;

        debug!(
            bytes = tokenizer.offset(),
            workflows = state.workflows().len(),
            images = state.image_count(),
            "Parsed document stream"
        );
        state.finalize()
    }

    fn spawn_reader<R>(&self, mut reader: R) -> (mpsc::Receiver<std::io::Result<Vec<u8>>>, ReadAhead)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(self.read_ahead_chunks);
        let chunk_size = self.chunk_size;
        let handle = tokio::spawn(async move {
            loop {
                let mut buf = vec![0u8; chunk_size];
                match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        buf.truncate(n);
                        if tx.send(Ok(buf)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });
        (rx, ReadAhead(handle))
    }

    async fn handle_pending(
        &self,
        pending: &mut Vec<Claim>,
        state: &mut ParsingState,
        progress: &ProgressTracker,
    ) -> Result<()> {
        for item in pending.drain(..) {
            self.handle(item, state, progress).await?;
        }
        Ok(())
    }

    async fn handle(
        &self,
        claim: Claim,
        state: &mut ParsingState,
        progress: &ProgressTracker,
    ) -> Result<()> {
        match claim {
            Claim::Version(value) => {
                state.has_version_property = true;
                state.version = Some(self.policy.check_version(&value)?);
            }
            Claim::Workflows(value) => {
                state.has_workflows_property = true;
                if !value.is_array() {
                    return Err(ExchangeError::InvalidRootProperty {
                        property: WORKFLOWS,
                        reason: "not an array".to_string(),
                    });
                }
            }
            Claim::Images(value) => {
                state.contains_images = true;
                if !value.is_object() {
                    return Err(ExchangeError::InvalidRootProperty {
                        property: IMAGES,
                        reason: "not an object".to_string(),
                    });
                }
            }
            Claim::Workflow { index, value } => {
                let declared = declares_images(&value);
                let record = self.policy.parse_workflow(index, value)?;
                state.push_workflow(index, record)?;
                state.requires_images |= declared;
                progress.add_total(1);
            }
            Claim::WorkflowImages { index, value } => {
                let images = parse_image_map(index, &value)?;
                progress.add_total(images.len() as u64);
            }
            Claim::ImageFile { hash, value } => {
                state.contains_images = true;
                progress.add_total(1);
                if !state.has_image(&hash) {
                    let Value::String(uri) = value else {
                        return Err(ExchangeError::MalformedImageData(format!(
                            "data for image {hash} is not a string"
                        )));
                    };
                    let blob = self.verifier.decode_and_verify_async(uri, hash).await?;
                    state.insert_image(blob);
                }
                progress.step();
            }
        }
        Ok(())
    }
}
