//! Status messages shown for each submit flow

use serde::Serialize;
use std::fmt;

use crate::error::FailureKind;

/// The two submit flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Flow {
    /// Upload roster and class count, get students sorted into classes
    Sort,
    /// Upload roster, get a MAP_score column added
    ComputeScore,
}

impl Flow {
    pub fn name(&self) -> &'static str {
        match self {
            Flow::Sort => "sort",
            Flow::ComputeScore => "compute-score",
        }
    }

    /// Heading shown above the download button
    pub fn offer_heading(&self) -> &'static str {
        match self {
            Flow::Sort => "Sorting Complete!",
            Flow::ComputeScore => "Addition complete",
        }
    }

    pub fn offer_button(&self) -> &'static str {
        match self {
            Flow::Sort => "Download Sorted Data",
            Flow::ComputeScore => "Download Updated File",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Status line. One at a time, replaced at each lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusMessage {
    InvalidInput(Flow),
    InFlight(Flow),
    Succeeded(Flow),
    MissingDownloadLink,
    Failed(Flow),
}

impl StatusMessage {
    pub fn text(&self) -> &'static str {
        match self {
            StatusMessage::InvalidInput(Flow::Sort) => {
                "Please specify a valid number of classes and select a file."
            }
            StatusMessage::InvalidInput(Flow::ComputeScore) => "Please select a file.",
            StatusMessage::InFlight(Flow::Sort) => "Uploading and Sorting ...",
            StatusMessage::InFlight(Flow::ComputeScore) => "Calculating MAP scores ...",
            StatusMessage::Succeeded(Flow::Sort) => "Sorting Complete!",
            StatusMessage::Succeeded(Flow::ComputeScore) => "MAP_scores added",
            StatusMessage::MissingDownloadLink => "Error: No download link provided.",
            StatusMessage::Failed(Flow::Sort) => "Upload failed",
            StatusMessage::Failed(Flow::ComputeScore) => "MAP calculation failed. Please try again.",
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, StatusMessage::InFlight(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            StatusMessage::InvalidInput(_) => Some(FailureKind::InvalidInput),
            StatusMessage::MissingDownloadLink => Some(FailureKind::MissingDownloadLink),
            StatusMessage::Failed(_) => Some(FailureKind::RequestFailed),
            StatusMessage::InFlight(_) | StatusMessage::Succeeded(_) => None,
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// A download link together with the labels of the flow that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOffer {
    pub flow: Flow,
    pub url: String,
}

impl DownloadOffer {
    pub fn heading(&self) -> &'static str {
        self.flow.offer_heading()
    }

    pub fn button_label(&self) -> &'static str {
        self.flow.offer_button()
    }
}
