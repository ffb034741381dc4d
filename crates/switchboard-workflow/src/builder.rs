//! Workflow builder and ready-made templates.

use crate::config::WorkflowConfig;
use crate::workflow::{StepType, Workflow, WorkflowStep};
use std::fmt;
use std::str::FromStr;

/// Fluent construction of a [`Workflow`].
///
/// Steps added with [`step`](Self::step) get sequential ids `step-1`,
/// `step-2` and so on.
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    name: String,
    description: String,
    steps: Vec<WorkflowStep>,
    config: WorkflowConfig,
    session_id: Option<String>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            config: WorkflowConfig::default(),
            session_id: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a step with a generated id.
    #[must_use]
    pub fn step(self, name: impl Into<String>, step_type: StepType) -> Self {
        let id = format!("step-{}", self.steps.len() + 1);
        self.step_with(WorkflowStep::new(id, name, step_type))
    }

    /// Appends a fully specified step.
    #[must_use]
    pub fn step_with(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.config.fail_fast = fail_fast;
        self
    }

    /// Binds the workflow's context to a session so a context store can
    /// carry history between runs.
    #[must_use]
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn build(self) -> Workflow {
        let mut workflow = Workflow::new(self.name, self.steps);
        workflow.description = self.description;
        workflow.config = self.config;
        if let Some(session_id) = self.session_id {
            workflow.context.update(|ctx| ctx.session_id = session_id);
        }
        workflow
    }
}

/// Built-in workflow shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Coding,
    Research,
    ProblemSolving,
    ContentCreation,
    DataAnalysis,
}

impl Template {
    pub const ALL: [Self; 5] = [
        Self::Coding,
        Self::Research,
        Self::ProblemSolving,
        Self::ContentCreation,
        Self::DataAnalysis,
    ];

    /// Builds the template's workflow around `subject`.
    pub fn build(self, subject: &str) -> Workflow {
        match self {
            Self::Coding => coding_workflow(subject),
            Self::Research => research_workflow(subject),
            Self::ProblemSolving => problem_solving_workflow(subject),
            Self::ContentCreation => content_creation_workflow(subject),
            Self::DataAnalysis => data_analysis_workflow(subject),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Coding => "coding",
            Self::Research => "research",
            Self::ProblemSolving => "problem-solving",
            Self::ContentCreation => "content-creation",
            Self::DataAnalysis => "data-analysis",
        })
    }
}

impl FromStr for Template {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "coding" => Ok(Self::Coding),
            "research" => Ok(Self::Research),
            "problem-solving" => Ok(Self::ProblemSolving),
            "content-creation" | "content" => Ok(Self::ContentCreation),
            "data-analysis" | "data" => Ok(Self::DataAnalysis),
            other => Err(format!(
                "unknown template '{}' (expected coding, research, problem-solving, content-creation or data-analysis)",
                other
            )),
        }
    }
}

pub fn coding_workflow(task: &str) -> Workflow {
    WorkflowBuilder::new(format!("Coding: {}", task))
        .description(format!("Analyze, implement and validate: {}", task))
        .step("Analyze Requirements", StepType::Analyze)
        .step("Generate Code", StepType::Generate)
        .step("Validate Code", StepType::Validate)
        .build()
}

pub fn research_workflow(topic: &str) -> Workflow {
    WorkflowBuilder::new(format!("Research: {}", topic))
        .description(format!("Research and synthesize findings on: {}", topic))
        .step("Analyze Topic", StepType::Analyze)
        .step("Gather Information", StepType::Process)
        .step("Synthesize Findings", StepType::Summarize)
        .build()
}

pub fn problem_solving_workflow(problem: &str) -> Workflow {
    WorkflowBuilder::new(format!("Problem Solving: {}", problem))
        .description(format!("Define, explore and decide on: {}", problem))
        .step("Define Problem", StepType::Analyze)
        .step("Generate Solutions", StepType::Generate)
        .step("Evaluate Options", StepType::Decision)
        .build()
}

pub fn content_creation_workflow(subject: &str) -> Workflow {
    WorkflowBuilder::new(format!("Content Creation: {}", subject))
        .description(format!("Research, draft and review content about: {}", subject))
        .step("Research Topic", StepType::Analyze)
        .step("Create Draft", StepType::Generate)
        .step("Review Content", StepType::Validate)
        .build()
}

pub fn data_analysis_workflow(dataset: &str) -> Workflow {
    WorkflowBuilder::new(format!("Data Analysis: {}", dataset))
        .description(format!("Explore, process and report on: {}", dataset))
        .step("Explore Data", StepType::Analyze)
        .step("Process Data", StepType::Process)
        .step("Generate Insights", StepType::Summarize)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;

    #[test]
    fn test_builder_assigns_sequential_ids() {
        let workflow = WorkflowBuilder::new("demo")
            .description("two steps")
            .step("First", StepType::Analyze)
            .step("Second", StepType::Generate)
            .fail_fast(true)
            .session("sess-1")
            .build();

        let ids: Vec<&str> = workflow.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["step-1", "step-2"]);
        assert_eq!(workflow.description, "two steps");
        assert!(workflow.config.fail_fast);
        assert_eq!(workflow.context.snapshot().session_id, "sess-1");
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_step_with_keeps_custom_step() {
        let workflow = WorkflowBuilder::new("custom")
            .step_with(
                WorkflowStep::new("gate", "Gate", StepType::Validate)
                    .with_condition(Condition::exists("ready")),
            )
            .step("After", StepType::Process)
            .build();

        assert_eq!(workflow.steps[0].id, "gate");
        assert!(workflow.steps[0].condition.is_some());
        assert_eq!(workflow.steps[1].id, "step-2");
    }

    #[test]
    fn test_templates_have_three_valid_steps() {
        for template in Template::ALL {
            let workflow = template.build("subject");
            assert_eq!(workflow.steps.len(), 3, "{template}");
            assert!(workflow.validate().is_ok(), "{template}");
            assert!(workflow.name.contains("subject"));
        }
        let coding = coding_workflow("parser");
        let names: Vec<&str> = coding.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Analyze Requirements", "Generate Code", "Validate Code"]);
    }

    #[test]
    fn test_template_names_parse() {
        for template in Template::ALL {
            assert_eq!(template.to_string().parse::<Template>().unwrap(), template);
        }
        assert_eq!("data_analysis".parse::<Template>().unwrap(), Template::DataAnalysis);
        assert!("poetry".parse::<Template>().is_err());
    }
}
