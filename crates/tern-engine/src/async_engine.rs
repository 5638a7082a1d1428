//! Asynchronous and parallel engine front-ends.
//!
//! The VM itself is single-threaded; these wrappers move file I/O off the
//! calling task and spread compilation of independent sources over a
//! thread pool.
//!
//! # Features
//!
//! - `async`: [`AsyncEngine`], non-blocking file evaluation
//! - `parallel`: [`ParallelCompiler`], compile many sources on rayon
//!
//! # Example
//!
//! ```ignore
//! use tern_engine::AsyncEngine;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = AsyncEngine::new();
//!     let result = engine.eval_file("script.tern").await.unwrap();
//!     println!("{}", result);
//! }
//! ```

#[cfg(feature = "async")]
use std::path::Path;
#[cfg(feature = "async")]
use tokio::fs;
#[cfg(feature = "async")]
use tokio::sync::RwLock;

use crate::Error;
#[cfg(feature = "parallel")]
use crate::compiler::Program;
#[cfg(feature = "async")]
use crate::{Engine, EngineConfig, runtime::value::Value};

/// An asynchronous engine.
///
/// Wraps an [`Engine`] behind a lock so it can be shared between tasks.
/// Evaluations are serialized; file reads are not.
#[cfg(feature = "async")]
pub struct AsyncEngine {
    engine: RwLock<Engine>,
}

#[cfg(feature = "async")]
impl AsyncEngine {
    /// Creates a new async engine.
    pub fn new() -> Self {
        Self::from_engine(Engine::new())
    }

    /// Creates an async engine with the given limits.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::from_engine(Engine::with_config(config))
    }

    /// Wraps an existing engine, keeping its host bindings.
    pub fn from_engine(engine: Engine) -> Self {
        Self {
            engine: RwLock::new(engine),
        }
    }

    /// Evaluates source code.
    ///
    /// Compilation runs under a read lock so concurrent callers can
    /// compile at the same time; execution takes the write lock.
    pub async fn eval(&self, source: &str) -> Result<Value, Error> {
        let program = self.engine.read().await.compile(source)?;
        self.engine.write().await.run(&program)
    }

    /// Evaluates a file, reading it with tokio's async file I/O.
    pub async fn eval_file(&self, path: impl AsRef<Path>) -> Result<Value, Error> {
        let source = read_source(path.as_ref()).await?;
        self.eval(&source).await
    }

    /// Evaluates several files.
    ///
    /// All files are read concurrently, then evaluated one after another in
    /// the order given. A file that fails to read yields its error in place.
    pub async fn eval_files(&self, paths: &[impl AsRef<Path>]) -> Vec<Result<Value, Error>> {
        let reads = paths.iter().map(|path| read_source(path.as_ref()));
        let sources = futures::future::join_all(reads).await;

        let mut results = Vec::with_capacity(sources.len());
        for source in sources {
            results.push(match source {
                Ok(source) => self.eval(&source).await,
                Err(err) => Err(err),
            });
        }
        results
    }

    /// Consumes the wrapper, returning the engine.
    pub fn into_inner(self) -> Engine {
        self.engine.into_inner()
    }
}

#[cfg(feature = "async")]
impl Default for AsyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "async")]
async fn read_source(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path)
        .await
        .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))
}

/// Compiles independent sources on a rayon thread pool.
///
/// The type registry is process-wide and read-only, so workers share it;
/// the environment is shared by reference and must be `Sync`.
#[cfg(feature = "parallel")]
pub struct ParallelCompiler {
    /// Dedicated pool, or rayon's global pool when `None`
    pool: Option<rayon::ThreadPool>,
}

#[cfg(feature = "parallel")]
impl ParallelCompiler {
    /// Creates a compiler that uses rayon's global pool.
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Creates a compiler with a dedicated pool of `num_threads` threads.
    pub fn with_threads(num_threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?;
        Ok(Self { pool: Some(pool) })
    }

    /// Compiles every source against `environment`.
    ///
    /// Results come back in the order of `sources`.
    pub fn compile_all<E>(&self, environment: &E, sources: &[&str]) -> Vec<Result<Program, Error>>
    where
        E: crate::Environment + Sync,
    {
        use rayon::prelude::*;

        let work = || {
            sources
                .par_iter()
                .map(|source| crate::compile_with(environment, source, false))
                .collect()
        };
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }
}

#[cfg(feature = "parallel")]
impl Default for ParallelCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_async_eval() {
        let engine = AsyncEngine::new();
        let result = engine.eval("1 + 2;").await.unwrap();
        assert_eq!(result, Value::Int(3));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_async_eval_string() {
        let engine = AsyncEngine::new();
        let result = engine.eval("\"hello\";").await.unwrap();
        assert!(matches!(result, Value::String(s) if s == "hello"));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_eval_files_keeps_order() {
        let dir = std::env::temp_dir().join(format!("tern-async-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let first = dir.join("first.tern");
        let second = dir.join("second.tern");
        std::fs::write(&first, "10 * 2;").unwrap();
        std::fs::write(&second, "\"two\";").unwrap();
        let missing = dir.join("missing.tern");

        let engine = AsyncEngine::new();
        let results = engine.eval_files(&[&first, &missing, &second]).await;
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(results[0], Ok(Value::Int(20)));
        assert!(matches!(results[1], Err(Error::Io(_))));
        assert_eq!(results[2], Ok(Value::string("two")));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_compile() {
        let mut environment = crate::HostEnvironment::new();
        crate::builtins::install(&mut environment);
        let compiler = ParallelCompiler::with_threads(2).unwrap();
        let results = compiler.compile_all(&environment, &["1 + 1;", "let = ;", "print(1);"]);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Syntax { .. })));
        assert!(results[2].is_ok());
    }
}
