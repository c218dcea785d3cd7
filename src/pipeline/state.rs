use super::PipelineError;

/// Record carried through one research run.
///
/// `question` is fixed at creation. Every other field starts empty, is written
/// exactly once by the stage that produces it, and reading it earlier is an
/// error rather than a default.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchState {
    question: String,
    search_results: Option<String>,
    selected_source_id: Option<String>,
    selected_title: Option<String>,
    retrieved_passages: Option<Vec<String>>,
    report: Option<String>,
}

fn read<'a, T>(slot: &'a Option<T>, name: &'static str) -> Result<&'a T, PipelineError> {
    slot.as_ref().ok_or(PipelineError::MissingField(name))
}

fn write_once<T>(slot: &mut Option<T>, value: T, name: &'static str) -> Result<(), PipelineError> {
    if slot.is_some() {
        return Err(PipelineError::AlreadyWritten(name));
    }
    *slot = Some(value);
    Ok(())
}

impl ResearchState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            search_results: None,
            selected_source_id: None,
            selected_title: None,
            retrieved_passages: None,
            report: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn search_results(&self) -> Result<&str, PipelineError> {
        read(&self.search_results, "search_results").map(String::as_str)
    }

    pub fn selected_source_id(&self) -> Result<&str, PipelineError> {
        read(&self.selected_source_id, "selected_source_id").map(String::as_str)
    }

    pub fn selected_title(&self) -> Result<&str, PipelineError> {
        read(&self.selected_title, "selected_title").map(String::as_str)
    }

    pub fn retrieved_passages(&self) -> Result<&[String], PipelineError> {
        read(&self.retrieved_passages, "retrieved_passages").map(Vec::as_slice)
    }

    pub fn report(&self) -> Result<&str, PipelineError> {
        read(&self.report, "report").map(String::as_str)
    }

    pub(super) fn set_search_results(&mut self, text: String) -> Result<(), PipelineError> {
        write_once(&mut self.search_results, text, "search_results")
    }

    pub(super) fn set_selection(&mut self, title: String, source_id: String) -> Result<(), PipelineError> {
        write_once(&mut self.selected_title, title, "selected_title")?;
        write_once(&mut self.selected_source_id, source_id, "selected_source_id")
    }

    pub(super) fn set_retrieved_passages(&mut self, passages: Vec<String>) -> Result<(), PipelineError> {
        write_once(&mut self.retrieved_passages, passages, "retrieved_passages")
    }

    pub(super) fn set_report(&mut self, report: String) -> Result<(), PipelineError> {
        write_once(&mut self.report, report, "report")
    }
}
