//! Evaluates a parsed query against the index: a boolean tree of
//! {term, phrase, filter, not} combinators, scored by
//! `sum(tf(t,d) * log(N / df(t)))` over the query's terms.

use std::collections::HashMap;

use rednet_search_index::{DocId, SearchIndex};

use crate::query::{FilterKind, QueryNode};

pub fn evaluate(node: &QueryNode, index: &SearchIndex, all_docs: &[DocId]) -> HashMap<DocId, f64> {
    match node {
        QueryNode::Term(term) => term_matches(term, index),
        QueryNode::Phrase(words) => phrase_matches(words, index),
        QueryNode::Filter(kind, value) => filter_matches(*kind, value, index, all_docs),
        QueryNode::Not(inner) => {
            let excluded = evaluate(inner, index, all_docs);
            all_docs.iter().filter(|doc_id| !excluded.contains_key(doc_id)).map(|doc_id| (*doc_id, 0.0)).collect()
        },
        QueryNode::And(lhs, rhs) => {
            let lhs = evaluate(lhs, index, all_docs);
            let rhs = evaluate(rhs, index, all_docs);
            lhs.into_iter()
                .filter_map(|(doc_id, score)| rhs.get(&doc_id).map(|other| (doc_id, score + other)))
                .collect()
        },
        QueryNode::Or(lhs, rhs) => {
            let mut lhs = evaluate(lhs, index, all_docs);
            let rhs = evaluate(rhs, index, all_docs);
            for (doc_id, score) in rhs {
                *lhs.entry(doc_id).or_insert(0.0) += score;
            }
            lhs
        },
    }
}

fn idf(index: &SearchIndex, term: &str) -> f64 {
    let n = index.total_documents() as f64;
    let df = index.df(term) as f64;
    if df <= 0.0 {
        0.0
    } else {
        (n / df).ln()
    }
}

fn term_matches(term: &str, index: &SearchIndex) -> HashMap<DocId, f64> {
    let Some(postings) = index.postings(term) else {
        return HashMap::new();
    };
    let idf = idf(index, term);
    postings.iter().map(|(doc_id, tf)| (*doc_id, *tf as f64 * idf)).collect()
}

fn phrase_matches(words: &[String], index: &SearchIndex) -> HashMap<DocId, f64> {
    let Some(first) = words.first() else {
        return HashMap::new();
    };
    let Some(candidates) = index.postings(first) else {
        return HashMap::new();
    };

    let mut matches = HashMap::new();
    for doc_id in candidates.keys() {
        let Some(doc) = index.document(*doc_id) else { continue };
        if !content_has_adjacent_phrase(&doc.content, words) && !content_has_adjacent_phrase(&doc.title, words) {
            continue;
        }
        let score = words.iter().map(|word| index.tf(word, *doc_id) as f64 * idf(index, word)).sum();
        matches.insert(*doc_id, score);
    }
    matches
}

fn content_has_adjacent_phrase(text: &str, words: &[String]) -> bool {
    let tokens = rednet_search_index::tokenize(text);
    if words.is_empty() || tokens.len() < words.len() {
        return false;
    }
    tokens.windows(words.len()).any(|window| window == words)
}

fn filter_matches(kind: FilterKind, value: &str, index: &SearchIndex, all_docs: &[DocId]) -> HashMap<DocId, f64> {
    let value_lower = value.to_lowercase();
    all_docs
        .iter()
        .filter_map(|doc_id| {
            let doc = index.document(*doc_id)?;
            let is_match = match kind {
                FilterKind::Site => host_of(&doc.url).eq_ignore_ascii_case(&value_lower),
                FilterKind::Type => doc.kind.eq_ignore_ascii_case(&value_lower),
                FilterKind::Title => doc.title.to_lowercase().contains(&value_lower),
            };
            is_match.then_some((*doc_id, 0.0))
        })
        .collect()
}

fn host_of(url: &str) -> String {
    url.split('/').next().unwrap_or(url).to_lowercase()
}

#[cfg(test)]
mod tests {
    use rednet_search_index::SearchIndex;

    use super::*;
    use crate::query::parse;

    fn sample_index() -> SearchIndex {
        let mut index = SearchIndex::new();
        index.add_document("shop.comp1.rednet/home", "Welcome", "the quick brown fox jumps", "rwml");
        index.add_document("news.comp2.rednet/home", "News Home", "brown bear sightings", "rwml");
        index
    }

    #[test]
    fn term_query_ranks_by_tf_idf() {
        let index = sample_index();
        let all_docs: Vec<DocId> = index.documents().map(|doc| doc.doc_id).collect();
        let node = parse("brown").unwrap();
        let scores = evaluate(&node, &index, &all_docs);
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn phrase_requires_adjacency() {
        let index = sample_index();
        let all_docs: Vec<DocId> = index.documents().map(|doc| doc.doc_id).collect();
        let node = parse("\"quick brown fox\"").unwrap();
        let scores = evaluate(&node, &index, &all_docs);
        assert_eq!(scores.len(), 1);

        let node = parse("\"brown fox quick\"").unwrap();
        let scores = evaluate(&node, &index, &all_docs);
        assert!(scores.is_empty());
    }

    #[test]
    fn site_filter_narrows_to_matching_host() {
        let index = sample_index();
        let all_docs: Vec<DocId> = index.documents().map(|doc| doc.doc_id).collect();
        let node = parse("site:news.comp2.rednet").unwrap();
        let scores = evaluate(&node, &index, &all_docs);
        assert_eq!(scores.len(), 1);
    }

    #[test]
    fn not_excludes_matching_documents() {
        let index = sample_index();
        let all_docs: Vec<DocId> = index.documents().map(|doc| doc.doc_id).collect();
        let node = parse("brown NOT fox").unwrap();
        let scores = evaluate(&node, &index, &all_docs);
        assert_eq!(scores.len(), 1);
    }
}
