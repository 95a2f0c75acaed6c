use std::fmt;

/// 2x2 confusion matrix for the phishing (positive) class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(truth: &[u8], predicted: &[u8]) -> Self {
        let mut matrix = Self::default();
        for (t, p) in truth.iter().zip(predicted) {
            match (t, p) {
                (0, 0) => matrix.true_negative += 1,
                (0, _) => matrix.false_positive += 1,
                (_, 0) => matrix.false_negative += 1,
                _ => matrix.true_positive += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.true_negative + self.true_positive) as f64 / total as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "              predicted")?;
        writeln!(f, "              legit  phish")?;
        writeln!(
            f,
            "actual legit  {:>5}  {:>5}",
            self.true_negative, self.false_positive
        )?;
        write!(
            f,
            "actual phish  {:>5}  {:>5}",
            self.false_negative, self.true_positive
        )
    }
}

/// Precision/recall/F1 for one class.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

fn class_metrics(tp: usize, fp: usize, fn_count: usize, support: usize) -> ClassMetrics {
    let precision = if tp + fp == 0 {
        0.0
    } else {
        tp as f64 / (tp + fp) as f64
    };
    let recall = if tp + fn_count == 0 {
        0.0
    } else {
        tp as f64 / (tp + fn_count) as f64
    };
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    ClassMetrics {
        precision,
        recall,
        f1,
        support,
    }
}

/// Per-class report over a test partition.
#[derive(Debug, Clone)]
pub struct ClassificationReport {
    pub legitimate: ClassMetrics,
    pub phishing: ClassMetrics,
    pub accuracy: f64,
}

impl ClassificationReport {
    pub fn from_confusion(matrix: &ConfusionMatrix) -> Self {
        let legitimate = class_metrics(
            matrix.true_negative,
            matrix.false_negative,
            matrix.false_positive,
            matrix.true_negative + matrix.false_positive,
        );
        let phishing = class_metrics(
            matrix.true_positive,
            matrix.false_positive,
            matrix.false_negative,
            matrix.false_negative + matrix.true_positive,
        );
        Self {
            legitimate,
            phishing,
            accuracy: matrix.accuracy(),
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (name, m) in [
            ("legitimate", &self.legitimate),
            ("phishing", &self.phishing),
        ] {
            writeln!(
                f,
                "{:<12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        write!(f, "{:<12} {:>39.4}", "accuracy", self.accuracy)
    }
}

/// F1 on the phishing class, the grid-search objective.
pub fn f1_phishing(truth: &[u8], predicted: &[u8]) -> f64 {
    ClassificationReport::from_confusion(&ConfusionMatrix::from_predictions(truth, predicted))
        .phishing
        .f1
}
