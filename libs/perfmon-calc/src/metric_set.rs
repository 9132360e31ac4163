//! Metric set: the ordered metrics and informations decoded from one report layout

use crate::api_mask::ApiMask;
use crate::evaluator::Evaluator;
use crate::information::Information;
use crate::metric::Metric;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSet {
    pub symbol_name: String,
    pub short_name: String,
    pub api_mask: ApiMask,
    /// Stride of one report in a streaming buffer
    pub raw_report_size: u32,
    /// Stride of one report in a query buffer
    pub query_report_size: u32,
    metrics: Vec<Metric>,
    informations: Vec<Information>,
}

impl MetricSet {
    pub fn new(symbol_name: impl Into<String>, api_mask: ApiMask) -> Self {
        let symbol_name = symbol_name.into();
        Self {
            short_name: symbol_name.clone(),
            symbol_name,
            api_mask,
            raw_report_size: 0,
            query_report_size: 0,
            metrics: Vec::new(),
            informations: Vec::new(),
        }
    }

    pub fn with_report_sizes(mut self, raw_report_size: u32, query_report_size: u32) -> Self {
        self.raw_report_size = raw_report_size;
        self.query_report_size = query_report_size;
        self
    }

    /// Append metrics, numbering them by position and binding metric references
    pub fn with_metrics(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        for mut metric in metrics {
            let position = self.metrics.len() as u32;
            metric.position_id = position;
            metric.id_in_set = position;
            self.metrics.push(metric);
        }
        self.resolve_indices();
        self
    }

    pub fn with_informations(
        mut self,
        informations: impl IntoIterator<Item = Information>,
    ) -> Self {
        for mut information in informations {
            let position = self.informations.len() as u32;
            information.position_id = position;
            information.id_in_set = position;
            self.informations.push(information);
        }
        self.resolve_indices();
        self
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn informations(&self) -> &[Information] {
        &self.informations
    }

    pub fn informations_mut(&mut self) -> &mut [Information] {
        &mut self.informations
    }

    pub fn metric(&self, index: usize) -> Option<&Metric> {
        self.metrics.get(index)
    }

    pub fn information(&self, index: usize) -> Option<&Information> {
        self.informations.get(index)
    }

    pub fn metrics_count(&self) -> usize {
        self.metrics.len()
    }

    pub fn information_count(&self) -> usize {
        self.informations.len()
    }

    /// Values produced per report: metrics first, then informations
    pub fn values_per_report(&self) -> usize {
        self.metrics.len() + self.informations.len()
    }

    pub fn is_stream(&self) -> bool {
        self.api_mask.is_io_stream()
    }

    pub fn metric_index(&self, symbol_name: &str) -> Option<usize> {
        self.metrics.iter().position(|m| m.symbol_name == symbol_name)
    }

    pub fn information_index(&self, symbol_name: &str) -> Option<usize> {
        self.informations
            .iter()
            .position(|i| i.symbol_name == symbol_name)
    }

    /// Bind every metric reference in every equation to its current position
    pub fn resolve_indices(&mut self) {
        let positions: FxHashMap<String, usize> = self
            .metrics
            .iter()
            .enumerate()
            .map(|(i, m)| (m.symbol_name.clone(), i))
            .collect();
        let lookup = |name: &str| positions.get(name).copied();

        let metric_equations = self.metrics.iter_mut().flat_map(Metric::equations_mut);
        let information_equations = self
            .informations
            .iter_mut()
            .flat_map(Information::equations_mut);
        for equation in metric_equations.chain(information_equations) {
            equation.resolve_metric_indices(lookup);
        }
    }

    /// Drop metrics and informations whose availability equation is false
    pub fn filter_available(&mut self, evaluator: &Evaluator<'_>) {
        let metrics_before = self.metrics.len();
        let informations_before = self.informations.len();

        self.metrics.retain(|m| m.is_available(evaluator));
        self.informations.retain(|i| i.is_available(evaluator));

        for (index, metric) in self.metrics.iter_mut().enumerate() {
            metric.id_in_set = index as u32;
        }
        for (index, information) in self.informations.iter_mut().enumerate() {
            information.id_in_set = index as u32;
        }
        self.resolve_indices();

        tracing::debug!(
            set = %self.symbol_name,
            metrics_removed = metrics_before - self.metrics.len(),
            informations_removed = informations_before - self.informations.len(),
            "Unavailable entries filtered"
        );
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::device::{Device, Generation};
    use crate::equation::{Equation, EquationElement, MetricIndex};
    use crate::information::InformationType;
    use crate::typed_value::ResultType;

    fn device() -> Device {
        Device::new("test", Generation::Tgl).with_global("EuCoresTotalCount", 8u32)
    }

    fn eq(source: &str, device: &Device) -> Equation {
        Equation::parse(source, device).unwrap()
    }

    fn reference_index(metric: &Metric) -> MetricIndex {
        match metric.normalization.as_ref().unwrap().elements()[0] {
            EquationElement::LocalMetricSymbol { index, .. } => index,
            ref other => panic!("unexpected element {:?}", other),
        }
    }

    fn sample_set(device: &Device) -> MetricSet {
        MetricSet::new("RenderBasic", ApiMask::IOSTREAM | ApiMask::OCL)
            .with_report_sizes(256, 320)
            .with_metrics([
                Metric::new("GpuTime", ResultType::U64),
                Metric::new("Hidden", ResultType::U64)
                    .with_availability(eq("$EuCoresTotalCount 16 UGTE", device)),
                Metric::new("Ratio", ResultType::Float)
                    .with_normalization(eq("$$GpuTime 2 UDIV", device)),
                Metric::new("Forward", ResultType::U64)
                    .with_normalization(eq("$$Ratio", device)),
            ])
            .with_informations([
                Information::new("ReportReason", InformationType::ReportReason),
                Information::new("ContextId", InformationType::ContextId),
            ])
    }

    #[test]
    fn test_lookups() {
        let set = sample_set(&device());
        assert!(set.is_stream());
        assert_eq!(set.metric_index("Ratio"), Some(2));
        assert_eq!(set.information_index("ContextId"), Some(1));
        assert_eq!(set.information_index("ReportReason"), Some(0));
        // exact, case-sensitive names only
        assert_eq!(set.information_index("contextid"), None);
        assert_eq!(set.values_per_report(), 6);
        assert_eq!(set.metric_index("Nope"), None);
    }

    #[test]
    fn test_references_resolved_including_forward() {
        let set = sample_set(&device());
        assert_eq!(reference_index(&set.metrics()[2]), MetricIndex::Resolved(0));
        assert_eq!(reference_index(&set.metrics()[3]), MetricIndex::Resolved(2));
    }

    #[test]
    fn test_filter_available_remaps_ids() {
        let dev = device();
        let mut set = sample_set(&dev);
        set.filter_available(&Evaluator::for_device(&dev));

        let names: Vec<&str> = set.metrics().iter().map(|m| m.symbol_name.as_str()).collect();
        assert_eq!(names, vec!["GpuTime", "Ratio", "Forward"]);

        let ratio = &set.metrics()[1];
        assert_eq!(ratio.id_in_set, 1);
        assert_eq!(ratio.position_id, 2);
        assert_eq!(reference_index(&set.metrics()[2]), MetricIndex::Resolved(1));
    }
}
