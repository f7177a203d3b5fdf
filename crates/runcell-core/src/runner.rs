//! The caller-facing facade over the whole execution service.
//!
//! A [`Runner`] owns the lifecycle manager and the interactive input
//! source. `run_code` is the one-call path: resolve the language,
//! preprocess blocking-input call sites, dispatch to the context, map
//! the reply. Every failure mode comes back as result text; nothing is
//! thrown across this boundary.

use tokio::sync::{broadcast, Mutex};

use crate::config::RunnerConfig;
use crate::core_types::{
    resolve_language, ExecutionRequest, ExecutionResult, Language, LanguageId, RuntimeStatus,
    LANGUAGES,
};
use crate::errors::InputError;
use crate::lifecycle::{EngineFactory, RuntimeManager};
use crate::preprocess::{preprocess_source, InputSource};
use crate::protocol::{WorkerReply, WorkerRequest};
use crate::runtimes::{javascript, python};

pub struct Runner {
    manager: RuntimeManager,
    input: Mutex<Box<dyn InputSource>>,
}

impl Runner {
    /// Builds a runner whose contexts launch real interpreter
    /// subprocesses, honoring the config's interpreter overrides. With
    /// `autostart` set, every catalog runtime begins initializing
    /// immediately.
    pub async fn new(config: RunnerConfig, input: Box<dyn InputSource>) -> Self {
        let factory = engine_factory(&config);
        Self::with_factory(config, input, factory).await
    }

    /// Same as [`Runner::new`] but with a caller-supplied engine factory.
    pub async fn with_factory(
        config: RunnerConfig,
        input: Box<dyn InputSource>,
        factory: EngineFactory,
    ) -> Self {
        let runner = Self {
            manager: RuntimeManager::new(factory),
            input: Mutex::new(input),
        };
        if config.autostart {
            runner.manager.start_all().await;
        }
        runner
    }

    /// Runs `code` under the named language. Name matching is
    /// case-insensitive substring matching against the catalog; unknown
    /// names resolve immediately without touching any context.
    pub async fn run_code(&self, language_name: &str, code: &str, stdin: &str) -> ExecutionResult {
        self.execute(ExecutionRequest::new(language_name, code, stdin))
            .await
    }

    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let language = match resolve_language(&request.language) {
            Some(language) => language,
            None => {
                return ExecutionResult::stderr_only(format!(
                    "Language not supported on client: {}",
                    request.language
                ));
            }
        };

        let source = match self.preprocess(language, &request.source_code).await {
            Ok(source) => source,
            Err(error) => return ExecutionResult::stderr_only(error.to_string()),
        };

        let prepared = ExecutionRequest::new(request.language, source, request.stdin);
        self.dispatch(language.id, prepared).await
    }

    async fn preprocess(
        &self,
        language: &'static Language,
        source: &str,
    ) -> Result<String, InputError> {
        let mut input = self.input.lock().await;
        preprocess_source(language, source, input.as_mut()).await
    }

    async fn dispatch(&self, language: LanguageId, request: ExecutionRequest) -> ExecutionResult {
        let outcome = self
            .manager
            .dispatch(
                language,
                WorkerRequest::Run {
                    code: request.source_code,
                    stdin: request.stdin,
                },
            )
            .await;
        let receiver = match outcome {
            Ok(receiver) => receiver,
            Err(error) => return ExecutionResult::stderr_only(error.to_string()),
        };
        match receiver.await {
            Ok(WorkerReply::Result { stdout, stderr }) => ExecutionResult { stdout, stderr },
            Ok(WorkerReply::Error { error }) => ExecutionResult::stderr_only(error),
            Err(_) => ExecutionResult::stderr_only(format!(
                "{} runtime went away before replying",
                language.display_name()
            )),
        }
    }

    pub fn languages(&self) -> &'static [Language] {
        LANGUAGES
    }

    pub async fn start(&self, language: LanguageId) {
        self.manager.start(language).await;
    }

    pub async fn restart(&self, language: LanguageId) {
        self.manager.restart(language).await;
    }

    pub async fn status(&self, language: LanguageId) -> RuntimeStatus {
        self.manager.status(language).await
    }

    pub async fn subscribe(&self, language: LanguageId) -> broadcast::Receiver<RuntimeStatus> {
        self.manager.subscribe(language).await
    }

    /// Waits for `language`'s context to reach `ready` or `error`.
    pub async fn wait_until_settled(&self, language: LanguageId) -> RuntimeStatus {
        self.manager.wait_until_settled(language).await
    }
}

fn engine_factory(config: &RunnerConfig) -> EngineFactory {
    let python_path = config.interpreter_for(LanguageId::Python);
    let node_path = config.interpreter_for(LanguageId::JavaScript);
    Box::new(move |language| match language {
        LanguageId::Python => Box::new(python::engine(python_path.clone())),
        LanguageId::JavaScript => Box::new(javascript::engine(node_path.clone())),
    })
}
