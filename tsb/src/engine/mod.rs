//! In-process task registry and executor
//!
//! Tasks are registered under stable names and composed through the
//! [`TaskHandle`]s that registration returns. A handle can only refer to a
//! task registered before it, so the graph is acyclic by construction.
//!
//! Running a task first runs its predecessors strictly in declared order,
//! then its body: a task function, a series of children (each awaited in
//! turn) or a parallel group (children run concurrently, first failure wins).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use thiserror::Error;
use tracing::{debug, info};

use crate::task::{TaskError, TaskFn};

/// Errors from registering or running tasks
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Task {0} is already registered")]
    DuplicateTask(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("Task {task} failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: TaskError,
    },
}

impl EngineError {
    /// The task error behind a failure, if any
    pub fn task_error(&self) -> Option<&TaskError> {
        match self {
            EngineError::TaskFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Token naming a registered task
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

enum Body {
    Run(TaskFn),
    Series(Vec<String>),
    Parallel(Vec<String>),
}

struct TaskDef {
    predecessors: Vec<String>,
    body: Body,
}

impl TaskDef {
    fn children(&self) -> &[String] {
        match &self.body {
            Body::Run(_) => &[],
            Body::Series(children) | Body::Parallel(children) => children,
        }
    }
}

/// Named task graph
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskDef>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry").field("tasks", &self.names()).finish()
    }
}

fn names_of(handles: &[&TaskHandle]) -> Vec<String> {
    handles.iter().map(|handle| handle.0.clone()).collect()
}

impl TaskRegistry {
    pub fn new() -> Self {
        debug!("TaskRegistry::new: called");
        Self::default()
    }

    fn insert(&mut self, name: String, def: TaskDef) -> Result<TaskHandle, EngineError> {
        if self.tasks.contains_key(&name) {
            debug!(%name, "TaskRegistry::insert: duplicate");
            return Err(EngineError::DuplicateTask(name));
        }
        debug!(%name, predecessors = ?def.predecessors, "TaskRegistry::insert: registered");
        self.tasks.insert(name.clone(), def);
        Ok(TaskHandle(name))
    }

    /// Register a task function run after `predecessors`
    pub fn task(
        &mut self,
        name: impl Into<String>,
        predecessors: &[&TaskHandle],
        run: TaskFn,
    ) -> Result<TaskHandle, EngineError> {
        self.insert(
            name.into(),
            TaskDef {
                predecessors: names_of(predecessors),
                body: Body::Run(run),
            },
        )
    }

    /// Register a task running `children` one after another
    pub fn series(&mut self, name: impl Into<String>, children: &[&TaskHandle]) -> Result<TaskHandle, EngineError> {
        self.insert(
            name.into(),
            TaskDef {
                predecessors: Vec::new(),
                body: Body::Series(names_of(children)),
            },
        )
    }

    /// Register a task running `children` concurrently
    pub fn parallel(&mut self, name: impl Into<String>, children: &[&TaskHandle]) -> Result<TaskHandle, EngineError> {
        self.insert(
            name.into(),
            TaskDef {
                predecessors: Vec::new(),
                body: Body::Parallel(names_of(children)),
            },
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Handle of an already registered task
    pub fn handle(&self, name: &str) -> Option<TaskHandle> {
        self.tasks.contains_key(name).then(|| TaskHandle(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Predecessor names of a task, in declared order
    pub fn predecessors(&self, name: &str) -> Result<Vec<String>, EngineError> {
        self.def(name).map(|def| def.predecessors.clone())
    }

    fn def(&self, name: &str) -> Result<&TaskDef, EngineError> {
        self.tasks
            .get(name)
            .ok_or_else(|| EngineError::UnknownTask(name.to_string()))
    }

    /// Task names reachable from `name`, dependencies first
    pub fn execution_order(&self, name: &str) -> Result<Vec<String>, EngineError> {
        debug!(%name, "TaskRegistry::execution_order: called");
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        self.order_dfs(name, &mut visited, &mut result)?;
        Ok(result)
    }

    fn order_dfs<'a>(
        &'a self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        result: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        if visited.contains(name) {
            return Ok(());
        }
        visited.insert(name);

        let def = self.def(name)?;
        for dep in def.predecessors.iter().chain(def.children()) {
            self.order_dfs(dep, visited, result)?;
        }
        result.push(name.to_string());
        Ok(())
    }

    /// Run a task and everything it depends on
    pub async fn run(&self, name: &str) -> Result<(), EngineError> {
        debug!(%name, "TaskRegistry::run: called");
        self.run_node(name).await
    }

    fn run_node<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), EngineError>> {
        async move {
            let def = self.def(name)?;
            for predecessor in &def.predecessors {
                self.run_node(predecessor).await?;
            }

            info!(task = %name, "Starting");
            let started = Instant::now();
            match &def.body {
                Body::Run(run) => run().await.map_err(|source| EngineError::TaskFailed {
                    task: name.to_string(),
                    source,
                })?,
                Body::Series(children) => {
                    for child in children {
                        self.run_node(child).await?;
                    }
                }
                Body::Parallel(children) => {
                    try_join_all(children.iter().map(|child| self.run_node(child))).await?;
                }
            }
            info!(task = %name, elapsed_ms = started.elapsed().as_millis() as u64, "Finished");
            Ok(())
        }
        .boxed()
    }
}
