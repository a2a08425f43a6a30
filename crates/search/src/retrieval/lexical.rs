//! In-memory BM25 (Okapi) keyword ranking
//!
//! Built once from a fixed chunk snapshot. Tokenization is lowercase plus
//! whitespace splitting, with no stemming and no stopword removal.

use askforge_common::Chunk;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    /// Term frequency saturation
    pub k1: f64,

    /// Length normalization strength
    pub b: f64,

    /// Floor for negative idf values, as a fraction of the average idf
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// Tokenize text the same way for corpus and queries
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Precomputed BM25 statistics over the corpus
#[derive(Debug)]
struct Bm25Index {
    params: Bm25Params,
    doc_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<usize>,
    avgdl: f64,
    idf: HashMap<String, f64>,
}

impl Bm25Index {
    fn build(tokenized: Vec<Vec<String>>, params: Bm25Params) -> Self {
        let corpus_size = tokenized.len();
        let mut doc_freqs = Vec::with_capacity(corpus_size);
        let mut doc_lens = Vec::with_capacity(corpus_size);
        // Ordered so the idf sum is accumulated identically on every build.
        let mut containing: BTreeMap<String, u32> = BTreeMap::new();
        let mut total_len = 0usize;

        for tokens in tokenized {
            total_len += tokens.len();
            doc_lens.push(tokens.len());

            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *containing.entry(term.clone()).or_insert(0) += 1;
            }
            doc_freqs.push(freqs);
        }

        let avgdl = total_len as f64 / corpus_size as f64;

        // idf = ln((N - n + 0.5) / (n + 0.5)); terms in more than half the
        // corpus go negative and are floored to epsilon * mean idf.
        let n_docs = corpus_size as f64;
        let mut idf = HashMap::with_capacity(containing.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, n) in containing {
            let n = n as f64;
            let value = (n_docs - n + 0.5).ln() - (n + 0.5).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }

        if !idf.is_empty() {
            let floor = params.epsilon * (idf_sum / idf.len() as f64);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        Self {
            params,
            doc_freqs,
            doc_lens,
            avgdl,
            idf,
        }
    }

    fn scores(&self, query_tokens: &[String]) -> Vec<f64> {
        let Bm25Params { k1, b, .. } = self.params;
        let mut scores = vec![0.0; self.doc_freqs.len()];

        for token in query_tokens {
            let idf = self.idf.get(token).copied().unwrap_or(0.0);
            for (doc, freqs) in self.doc_freqs.iter().enumerate() {
                let tf = freqs.get(token).copied().unwrap_or(0) as f64;
                if tf == 0.0 {
                    continue;
                }
                let length_ratio = if self.avgdl > 0.0 {
                    self.doc_lens[doc] as f64 / self.avgdl
                } else {
                    1.0
                };
                scores[doc] += idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * length_ratio));
            }
        }

        scores
    }
}

/// Keyword ranker over a read-only chunk snapshot
#[derive(Debug)]
pub struct LexicalRanker {
    chunks: Vec<Chunk>,
    index: Option<Bm25Index>,
}

impl LexicalRanker {
    /// Build the ranker with default BM25 parameters
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self::with_params(chunks, Bm25Params::default())
    }

    /// Build the ranker with custom BM25 parameters
    pub fn with_params(chunks: Vec<Chunk>, params: Bm25Params) -> Self {
        if chunks.is_empty() {
            warn!("BM25 initialized with empty chunks list");
            return Self {
                chunks,
                index: None,
            };
        }

        info!(chunk_count = chunks.len(), "BM25 indexing chunks");
        let tokenized = chunks.iter().map(|c| tokenize(&c.content)).collect();
        let index = Bm25Index::build(tokenized, params);
        info!("BM25 index built successfully");

        Self {
            chunks,
            index: Some(index),
        }
    }

    /// Number of chunks in the snapshot
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// BM25 score of every chunk for `query`, in corpus order
    pub fn scores(&self, query: &str) -> Vec<f64> {
        match &self.index {
            Some(index) => index.scores(&tokenize(query)),
            None => Vec::new(),
        }
    }

    /// Top `k` chunks by descending score.
    ///
    /// Always returns `min(k, len)` chunks, zero-score ones included.
    /// Among equal scores the chunk later in the corpus comes first.
    pub fn rank(&self, query: &str, k: usize) -> Vec<Chunk> {
        if self.index.is_none() {
            warn!("BM25 retriever not initialized");
            return Vec::new();
        }

        let scores = self.scores(query);
        let mut order: Vec<usize> = (0..scores.len()).collect();
        // Ties go to the later chunk in the corpus.
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(b.cmp(&a)));

        order
            .into_iter()
            .take(k)
            .map(|idx| self.chunks[idx].clone())
            .collect()
    }
}
