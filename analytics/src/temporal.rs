use citegraph_core::CitationGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Papers per publication year, ascending. Years without papers are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearHistogram {
    pub bins: Vec<(i32, usize)>,
    pub unknown_year_count: usize,
}

impl YearHistogram {
    /// Papers with a known year.
    pub fn total(&self) -> usize {
        self.bins.iter().map(|(_, count)| count).sum()
    }

    pub fn count(&self, year: i32) -> usize {
        self.bins
            .binary_search_by_key(&year, |(bin_year, _)| *bin_year)
            .map(|index| self.bins[index].1)
            .unwrap_or(0)
    }

    pub fn year_range(&self) -> Option<(i32, i32)> {
        let first = self.bins.first()?.0;
        let last = self.bins.last()?.0;
        Some((first, last))
    }
}

pub fn year_histogram(graph: &CitationGraph) -> YearHistogram {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    let mut unknown_year_count = 0;
    for paper in graph.papers() {
        match paper.year {
            Some(year) => *counts.entry(year).or_insert(0) += 1,
            None => unknown_year_count += 1,
        }
    }
    YearHistogram {
        bins: counts.into_iter().collect(),
        unknown_year_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citegraph_core::model::{Identifier, Paper};

    fn paper(raw: &str, year: Option<i32>) -> Paper {
        let mut paper = Paper::new(Identifier::parse(raw).unwrap());
        paper.year = year;
        paper
    }

    #[test]
    fn bins_are_sorted_and_unknown_years_counted_apart() {
        let mut graph = CitationGraph::new(paper("10.1/root", Some(2020)));
        graph.add_node(paper("10.1/a", Some(2015)));
        graph.add_node(paper("10.1/b", Some(2020)));
        graph.add_node(paper("10.1/c", None));
        graph.add_node(paper("10.1/d", Some(1999)));

        let histogram = year_histogram(&graph);
        assert_eq!(histogram.bins, vec![(1999, 1), (2015, 1), (2020, 2)]);
        assert_eq!(histogram.unknown_year_count, 1);
        assert_eq!(histogram.total() + histogram.unknown_year_count, graph.node_count());
        assert_eq!(histogram.count(2020), 2);
        assert_eq!(histogram.count(2000), 0);
        assert_eq!(histogram.year_range(), Some((1999, 2020)));
    }

    #[test]
    fn all_unknown_years_give_empty_bins() {
        let graph = CitationGraph::new(paper("10.1/root", None));
        let histogram = year_histogram(&graph);
        assert!(histogram.bins.is_empty());
        assert_eq!(histogram.unknown_year_count, 1);
        assert_eq!(histogram.year_range(), None);
    }
}
