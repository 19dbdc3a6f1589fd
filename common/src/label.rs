/// Labels requested from the service per image; the service caps its answer at this.
pub const MAX_LABELS: i32 = 10;
/// Labels below this confidence are filtered out server-side.
pub const MIN_CONFIDENCE: f32 = 70.0;
/// How many labels are shown per cycle.
pub const TOP_LABELS: usize = 3;

/// A named classification with a confidence score in 0..=100.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
    pub confidence: f32,
}

impl Label {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }

    /// Confidence as shown in the table, e.g. `98.57%`.
    pub fn confidence_text(&self) -> String {
        format!("{:.2}%", self.confidence)
    }
}

/// At most [`TOP_LABELS`] labels, ordered by non-increasing confidence.
///
/// Only [`rank_labels`] builds one, so the ordering and length hold for every
/// value of this type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedLabelSet(Vec<Label>);

impl RankedLabelSet {
    pub fn labels(&self) -> &[Label] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Label> {
        self.0.iter()
    }

    /// Labels whose name matches one of `names`, ignoring case.
    pub fn matching<'a>(&'a self, names: &'a [String]) -> impl Iterator<Item = &'a Label> + 'a {
        self.0
            .iter()
            .filter(move |label| names.iter().any(|n| n.eq_ignore_ascii_case(&label.name)))
    }
}

impl<'a> IntoIterator for &'a RankedLabelSet {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Sort by descending confidence and keep the top [`TOP_LABELS`].
///
/// The sort is stable, so equal confidences keep the service's order.
pub fn rank_labels(mut labels: Vec<Label>) -> RankedLabelSet {
    labels.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    labels.truncate(TOP_LABELS);
    RankedLabelSet(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(set: &RankedLabelSet) -> Vec<&str> {
        set.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn top_three_descending() {
        let ranked = rank_labels(vec![
            Label::new("A", 90.0),
            Label::new("B", 95.0),
            Label::new("C", 70.0),
            Label::new("D", 99.0),
        ]);
        assert_eq!(names(&ranked), vec!["D", "B", "A"]);
        assert_eq!(ranked.labels()[0].confidence, 99.0);
    }

    #[test]
    fn length_is_min_of_n_and_three() {
        for n in 0..=MAX_LABELS as usize {
            let labels = (0..n)
                .map(|i| Label::new(format!("L{i}"), 70.0 + (i * 7 % 30) as f32))
                .collect();
            let ranked = rank_labels(labels);
            assert_eq!(ranked.len(), n.min(TOP_LABELS), "n = {n}");
            for pair in ranked.labels().windows(2) {
                assert!(pair[0].confidence >= pair[1].confidence, "n = {n}");
            }
        }
    }

    #[test]
    fn empty_response_ranks_empty() {
        assert!(rank_labels(Vec::new()).is_empty());
    }

    #[test]
    fn ties_keep_response_order() {
        let ranked = rank_labels(vec![
            Label::new("first", 80.0),
            Label::new("second", 80.0),
            Label::new("top", 81.0),
            Label::new("third", 80.0),
        ]);
        assert_eq!(names(&ranked), vec!["top", "first", "second"]);
    }

    #[test]
    fn confidence_two_decimals() {
        assert_eq!(Label::new("Dog", 98.5712).confidence_text(), "98.57%");
        assert_eq!(Label::new("Pet", 70.0).confidence_text(), "70.00%");
    }

    #[test]
    fn matching_ignores_case() {
        let ranked = rank_labels(vec![Label::new("Dog", 97.0), Label::new("Animal", 99.0)]);
        let watch = vec!["dog".to_string()];
        let hits: Vec<_> = ranked.matching(&watch).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Dog");
    }
}
