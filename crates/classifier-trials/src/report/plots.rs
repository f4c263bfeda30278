use plotly::common::{DashType, Line, Mode};
use plotly::layout::{Axis, Layout};
use plotly::{Plot, Scatter};

use crate::model_map::ModelMap;
use crate::trainer::EvaluationResult;

/// Overlay the ROC curve of every evaluated model, with the chance diagonal.
///
/// # Arguments
///
/// * `results` - Evaluation results keyed by model name
/// * `title` - The title of the plot
///
pub fn plot_roc_curves(results: &ModelMap<EvaluationResult>, title: &str) -> Plot {
    let mut plot = Plot::new();

    for (name, result) in results.iter() {
        let trace = Scatter::new(result.fpr.clone(), result.tpr.clone())
            .mode(Mode::Lines)
            .name(format!("{} (AUC = {:.3})", name, result.auc));
        plot.add_trace(trace);
    }

    let chance = Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
        .mode(Mode::Lines)
        .name("Chance")
        .line(Line::new().color("grey").dash(DashType::Dash));
    plot.add_trace(chance);

    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("False Positive Rate"))
            .y_axis(Axis::new().title("True Positive Rate")),
    );

    plot
}
