use crate::error::SdkError;
use analytics::{AnalysisReport, YearHistogram};
use citegraph_core::model::{Identifier, Paper};
use citegraph_core::CitationGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;

pub const PAPERS_CSV_HEADER: &str =
    "identifier,title,authors,year,venue,citation_count,reference_count";
pub const HISTOGRAM_CSV_HEADER: &str = "year,count";

/// Position of a node relative to the root of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeGroup {
    Root,
    /// Cited by the root.
    Reference,
    /// Cites the root.
    Citation,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExport {
    pub id: Identifier,
    pub label: String,
    pub group: NodeGroup,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub citation_count: u64,
    pub reference_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeExport {
    pub from: Identifier,
    pub to: Identifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub root: Identifier,
    pub nodes: Vec<NodeExport>,
    pub edges: Vec<EdgeExport>,
}

impl GraphExport {
    pub fn from_graph(graph: &CitationGraph) -> Self {
        let root = graph.root();
        let references: HashSet<&Identifier> = graph.successors(root).into_iter().collect();
        let citations: HashSet<&Identifier> = graph.predecessors(root).into_iter().collect();

        let nodes = graph
            .papers()
            .map(|paper| {
                let id = &paper.identifier;
                let group = if id == root {
                    NodeGroup::Root
                } else if references.contains(id) {
                    NodeGroup::Reference
                } else if citations.contains(id) {
                    NodeGroup::Citation
                } else {
                    NodeGroup::Other
                };
                NodeExport {
                    id: id.clone(),
                    label: paper.title_or_identifier().to_string(),
                    group,
                    title: paper.title.clone(),
                    authors: paper.authors.clone(),
                    year: paper.year,
                    venue: paper.venue.clone(),
                    citation_count: paper.citation_count,
                    reference_count: paper.reference_count,
                }
            })
            .collect();

        let edges = graph
            .edges()
            .map(|edge| EdgeExport {
                from: edge.citing.clone(),
                to: edge.cited.clone(),
            })
            .collect();

        Self {
            root: root.clone(),
            nodes,
            edges,
        }
    }
}

/// Node/edge list as pretty-printed JSON.
pub fn graph_json(graph: &CitationGraph) -> Result<String, SdkError> {
    Ok(serde_json::to_string_pretty(&GraphExport::from_graph(graph))?)
}

pub fn report_json(report: &AnalysisReport) -> Result<String, SdkError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// One row per paper. Authors are joined with `; ` and an unknown year is an empty field.
pub fn papers_csv<'a, I>(papers: I) -> String
where
    I: IntoIterator<Item = &'a Paper>,
{
    let mut out = String::new();
    out.push_str(PAPERS_CSV_HEADER);
    out.push_str("\r\n");
    for paper in papers {
        let year = paper.year.map(|y| y.to_string()).unwrap_or_default();
        let fields = [
            csv_field(paper.identifier.as_str()),
            csv_field(paper.title.as_deref().unwrap_or_default()),
            csv_field(&paper.authors.join("; ")),
            year,
            csv_field(paper.venue.as_deref().unwrap_or_default()),
            paper.citation_count.to_string(),
            paper.reference_count.to_string(),
        ];
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }
    out
}

pub fn histogram_csv(histogram: &YearHistogram) -> String {
    let mut out = String::new();
    out.push_str(HISTOGRAM_CSV_HEADER);
    out.push_str("\r\n");
    for (year, count) in &histogram.bins {
        // Writing to a String cannot fail.
        let _ = write!(out, "{year},{count}\r\n");
    }
    out
}

/// RFC 4180 quoting: fields holding a comma, quote or line break are quoted
/// and embedded quotes doubled.
fn csv_field(value: &str) -> String {
    if value.contains(|c: char| matches!(c, ',' | '"' | '\r' | '\n')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> Identifier {
        Identifier::parse(raw).unwrap()
    }

    fn paper(raw: &str) -> Paper {
        Paper::new(id(raw))
    }

    #[test]
    fn csv_fields_are_quoted_only_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a, b"), "\"a, b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn papers_csv_rows() {
        let mut first = paper("10.1/a");
        first.title = Some("Graphs, briefly".into());
        first.authors = vec!["Ada Lovelace".into(), "Alan Turing".into()];
        first.year = Some(1950);
        first.venue = Some("Mind".into());
        first.citation_count = 12;
        first.reference_count = 3;
        let second = paper("10.1/b");

        let csv = papers_csv([&first, &second]);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], PAPERS_CSV_HEADER);
        assert_eq!(
            lines[1],
            "10.1/a,\"Graphs, briefly\",Ada Lovelace; Alan Turing,1950,Mind,12,3"
        );
        assert_eq!(lines[2], "10.1/b,,,,,0,0");
        assert_eq!(lines[3], "");
    }

    #[test]
    fn histogram_csv_rows() {
        let histogram = YearHistogram {
            bins: vec![(1999, 2), (2004, 1)],
            unknown_year_count: 5,
        };
        assert_eq!(
            histogram_csv(&histogram),
            "year,count\r\n1999,2\r\n2004,1\r\n"
        );
    }

    #[test]
    fn graph_export_groups_nodes_relative_to_root() {
        let mut graph = CitationGraph::new(paper("10.1/root"));
        for node in ["10.1/ref", "10.1/cit", "10.1/far"] {
            graph.add_node(paper(node));
        }
        graph.add_edge(&id("10.1/root"), &id("10.1/ref"));
        graph.add_edge(&id("10.1/cit"), &id("10.1/root"));
        graph.add_edge(&id("10.1/far"), &id("10.1/cit"));

        let export = GraphExport::from_graph(&graph);
        let group = |raw: &str| {
            export
                .nodes
                .iter()
                .find(|node| node.id == id(raw))
                .map(|node| node.group)
        };
        assert_eq!(export.root, id("10.1/root"));
        assert_eq!(group("10.1/root"), Some(NodeGroup::Root));
        assert_eq!(group("10.1/ref"), Some(NodeGroup::Reference));
        assert_eq!(group("10.1/cit"), Some(NodeGroup::Citation));
        assert_eq!(group("10.1/far"), Some(NodeGroup::Other));
        assert_eq!(export.edges.len(), 3);

        let json: serde_json::Value = serde_json::from_str(&graph_json(&graph).unwrap()).unwrap();
        assert_eq!(json["root"], "10.1/root");
        assert_eq!(json["nodes"].as_array().map(Vec::len), Some(4));
        assert!(json["edges"]
            .as_array()
            .unwrap()
            .iter()
            .any(|edge| edge["from"] == "10.1/root" && edge["to"] == "10.1/ref"));
    }
}
