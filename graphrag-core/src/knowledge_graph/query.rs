// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Global Query Answering
//!
//! Map-reduce over community summaries:
//!
//! - **Map**: ask each community for a partial answer and a `Score:` line
//! - **Reduce**: rank the useful partials and synthesize one final answer
//!
//! A community that fails, answers `NONE`, or scores 0 simply contributes
//! nothing. When nothing useful comes back no reduce call is made.

use crate::error::{GraphRagError, Result};
use crate::knowledge_graph::entities::{CommunitySummaryRecord, QueryAnswer};
use crate::knowledge_graph::summarizer::SUMMARY_FAILED;
use crate::llm::{generate_with_timeout, LLMClient};
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::fmt::Write;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Map instruction; `{query}` is replaced, the community summary goes in as content
pub const MAP_PROMPT: &str = "\
You are answering a question using only the community summary provided.
If the summary contains nothing relevant to the question, reply with exactly: NONE
Otherwise answer concisely, then end with a line of the form
Score: <0-100>
rating how useful your answer is for the question.

Question: {query}
";

/// Reduce instruction; `{query}` is replaced, ranked partial answers go in as content
pub const REDUCE_PROMPT: &str = "\
You are given partial answers to a question, each drawn from a different part of a document collection and ordered from most to least relevant.
Combine them into a single, coherent, and comprehensive answer. Remove redundancy, resolve contradictions in favor of the more relevant answers, and do not add information that is not present in the partial answers.

Question: {query}
";

/// Final answer when no community had anything useful to say
pub const NO_ANSWER: &str =
    "No relevant information was found in the indexed communities to answer this query.";

/// Relevance assumed when a partial answer carries no score line
pub const DEFAULT_SCORE: u8 = 50;

static SCORE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*[*_]*\s*(?:relevance\s+)?score\s*[*_]*\s*[:=]\s*[*_]*\s*(-?\d+(?:\.\d+)?)")
        .expect("score line pattern is valid")
});

/// One usable partial answer
#[derive(Debug, Clone, PartialEq)]
pub struct PartialAnswer {
    pub community_id: u32,
    pub answer: String,
    pub score: u8,
}

/// Parse a map-phase response. `None` means zero weight.
pub fn parse_partial_answer(raw: &str) -> Option<(String, u8)> {
    let mut score = None;
    let mut kept = Vec::new();

    for line in raw.lines() {
        match SCORE_LINE.captures(line) {
            Some(caps) => {
                score = caps[1]
                    .parse::<f64>()
                    .ok()
                    .map(|value| value.round().clamp(0.0, 100.0) as u8);
            }
            None => kept.push(line),
        }
    }

    let answer = kept.join("\n").trim().to_string();
    let score = score.unwrap_or(DEFAULT_SCORE);

    let marker = answer.trim_end_matches('.').to_ascii_uppercase();
    if answer.is_empty() || marker == "NONE" || marker == "N/A" || score == 0 {
        return None;
    }

    Some((answer, score))
}

/// Map-reduce answerer over community summaries
pub struct QueryAnswerer {
    llm: Arc<dyn LLMClient>,
    max_concurrency: usize,
    request_timeout: Duration,
    max_partial_answers: usize,
}

impl QueryAnswerer {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        max_concurrency: usize,
        request_timeout: Duration,
        max_partial_answers: usize,
    ) -> Self {
        Self {
            llm,
            max_concurrency: max_concurrency.max(1),
            request_timeout,
            max_partial_answers: max_partial_answers.max(1),
        }
    }

    /// Answer `query` from `records`.
    ///
    /// Empty `records` is fatal and checked before any call.
    pub async fn answer(
        &self,
        query: &str,
        records: &[CommunitySummaryRecord],
    ) -> Result<QueryAnswer> {
        if records.is_empty() {
            return Err(GraphRagError::EmptyInput(
                "no community summaries to query".to_string(),
            ));
        }

        info!(query, communities = records.len(), "Generating global answer");

        let usable: Vec<&CommunitySummaryRecord> = records
            .iter()
            .filter(|r| r.summary != SUMMARY_FAILED && !r.summary.trim().is_empty())
            .collect();
        if usable.len() < records.len() {
            warn!(
                skipped = records.len() - usable.len(),
                "Skipping communities without a usable summary"
            );
        }

        let instruction = MAP_PROMPT.replace("{query}", query);
        let mapped: Vec<Option<PartialAnswer>> = stream::iter(usable.iter().copied())
            .map(|record| self.map_one(&instruction, record))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut partials: Vec<PartialAnswer> = mapped.into_iter().flatten().collect();
        // Stable sort: equal scores keep community order
        partials.sort_by(|a, b| b.score.cmp(&a.score));
        partials.truncate(self.max_partial_answers);

        info!(
            consulted = usable.len(),
            useful = partials.len(),
            "Map phase complete"
        );

        if partials.is_empty() {
            return Ok(QueryAnswer {
                query: query.to_string(),
                final_answer: NO_ANSWER.to_string(),
                partials_used: 0,
                communities_consulted: usable.len(),
            });
        }

        let final_answer = self.reduce(query, &partials).await;

        Ok(QueryAnswer {
            query: query.to_string(),
            final_answer,
            partials_used: partials.len(),
            communities_consulted: usable.len(),
        })
    }

    async fn map_one(
        &self,
        instruction: &str,
        record: &CommunitySummaryRecord,
    ) -> Option<PartialAnswer> {
        let raw = match generate_with_timeout(
            self.llm.as_ref(),
            instruction,
            &record.summary,
            self.request_timeout,
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                error!(community = record.community_id, "Map call failed: {}", e);
                return None;
            }
        };

        match parse_partial_answer(&raw) {
            Some((answer, score)) => {
                debug!(community = record.community_id, score, "Partial answer: {}", answer);
                Some(PartialAnswer {
                    community_id: record.community_id,
                    answer,
                    score,
                })
            }
            None => {
                debug!(community = record.community_id, "No relevant partial answer");
                None
            }
        }
    }

    async fn reduce(&self, query: &str, partials: &[PartialAnswer]) -> String {
        let instruction = REDUCE_PROMPT.replace("{query}", query);

        let mut content = String::new();
        for (rank, partial) in partials.iter().enumerate() {
            let _ = writeln!(
                content,
                "Partial answer {} (community {}, score {}):\n{}\n",
                rank + 1,
                partial.community_id,
                partial.score,
                partial.answer
            );
        }

        match generate_with_timeout(
            self.llm.as_ref(),
            &instruction,
            content.trim_end(),
            self.request_timeout,
        )
        .await
        {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => {
                warn!("Reduce call returned nothing, using the top partial answer");
                partials[0].answer.clone()
            }
            Err(e) => {
                error!("Reduce call failed ({}), using the top partial answer", e);
                partials[0].answer.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LLMError;
    use crate::llm::LLMResponse;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies to map calls by summary text; counts every call
    struct CountingLLM {
        map_replies: HashMap<String, std::result::Result<String, String>>,
        reduce_reply: std::result::Result<String, String>,
        map_calls: AtomicUsize,
        reduce_calls: AtomicUsize,
        reduce_inputs: Mutex<Vec<String>>,
    }

    impl CountingLLM {
        fn new(
            map_replies: &[(&str, std::result::Result<&str, &str>)],
            reduce_reply: std::result::Result<&str, &str>,
        ) -> Self {
            Self {
                map_replies: map_replies
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.map(str::to_string).map_err(str::to_string)))
                    .collect(),
                reduce_reply: reduce_reply.map(str::to_string).map_err(str::to_string),
                map_calls: AtomicUsize::new(0),
                reduce_calls: AtomicUsize::new(0),
                reduce_inputs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMClient for CountingLLM {
        async fn generate(
            &self,
            instruction: &str,
            content: &str,
        ) -> std::result::Result<LLMResponse, LLMError> {
            let reply = if instruction.starts_with("You are answering") {
                self.map_calls.fetch_add(1, Ordering::SeqCst);
                self.map_replies
                    .get(content)
                    .cloned()
                    .unwrap_or_else(|| Ok("NONE".to_string()))
            } else {
                self.reduce_calls.fetch_add(1, Ordering::SeqCst);
                self.reduce_inputs.lock().push(content.to_string());
                self.reduce_reply.clone()
            };

            reply
                .map(|content| LLMResponse {
                    content,
                    model: "counting".to_string(),
                    duration_ms: 1,
                })
                .map_err(LLMError::ApiError)
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    fn record(id: u32, summary: &str) -> CommunitySummaryRecord {
        CommunitySummaryRecord {
            community_id: id,
            nodes: vec![format!("node{}", id)],
            summary: summary.to_string(),
        }
    }

    fn answerer(llm: Arc<CountingLLM>, max_partials: usize) -> QueryAnswerer {
        QueryAnswerer::new(llm, 3, Duration::from_secs(5), max_partials)
    }

    #[test]
    fn test_parse_partial_answer() {
        assert_eq!(
            parse_partial_answer("Alice founded Acme.\nScore: 85"),
            Some(("Alice founded Acme.".to_string(), 85))
        );
        assert_eq!(
            parse_partial_answer("Alice founded Acme."),
            Some(("Alice founded Acme.".to_string(), DEFAULT_SCORE))
        );
        assert_eq!(
            parse_partial_answer("Something.\n**Score:** 140"),
            Some(("Something.".to_string(), 100))
        );
        assert_eq!(parse_partial_answer("Something.\nscore = 0"), None);
        assert_eq!(parse_partial_answer("NONE"), None);
        assert_eq!(parse_partial_answer("n/a.\nScore: 10"), None);
        assert_eq!(parse_partial_answer("   \n"), None);
    }

    #[tokio::test]
    async fn test_all_empty_skips_reduce() {
        let llm = Arc::new(CountingLLM::new(
            &[("s0", Ok("NONE")), ("s1", Err("down")), ("s2", Ok("Nothing here.\nScore: 0"))],
            Ok("should not be used"),
        ));

        let result = answerer(llm.clone(), 16)
            .answer("Who is Alice?", &[record(0, "s0"), record(1, "s1"), record(2, "s2")])
            .await
            .unwrap();

        assert_eq!(result.final_answer, NO_ANSWER);
        assert_eq!(result.partials_used, 0);
        assert_eq!(result.communities_consulted, 3);
        assert_eq!(llm.map_calls.load(Ordering::SeqCst), 3);
        assert_eq!(llm.reduce_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reduce_receives_ranked_partials() {
        let llm = Arc::new(CountingLLM::new(
            &[
                ("s0", Ok("Low relevance.\nScore: 20")),
                ("s1", Ok("High relevance.\nScore: 90")),
                ("s2", Err("timeout")),
                ("s3", Ok("Unscored.")),
            ],
            Ok("  Combined answer.  "),
        ));

        let result = answerer(llm.clone(), 16)
            .answer(
                "What happened?",
                &[record(0, "s0"), record(1, "s1"), record(2, "s2"), record(3, "s3")],
            )
            .await
            .unwrap();

        assert_eq!(result.final_answer, "Combined answer.");
        assert_eq!(result.partials_used, 3);
        assert_eq!(llm.reduce_calls.load(Ordering::SeqCst), 1);

        let inputs = llm.reduce_inputs.lock();
        let high = inputs[0].find("High relevance.").unwrap();
        let unscored = inputs[0].find("Unscored.").unwrap();
        let low = inputs[0].find("Low relevance.").unwrap();
        assert!(high < unscored && unscored < low);
    }

    #[tokio::test]
    async fn test_max_partial_answers_caps_reduce_input() {
        let llm = Arc::new(CountingLLM::new(
            &[
                ("s0", Ok("First.\nScore: 40")),
                ("s1", Ok("Second.\nScore: 40")),
                ("s2", Ok("Third.\nScore: 70")),
            ],
            Ok("Done."),
        ));

        let result = answerer(llm.clone(), 2)
            .answer("q", &[record(0, "s0"), record(1, "s1"), record(2, "s2")])
            .await
            .unwrap();

        assert_eq!(result.partials_used, 2);
        let inputs = llm.reduce_inputs.lock();
        assert!(inputs[0].contains("Third."));
        assert!(inputs[0].contains("First."));
        assert!(!inputs[0].contains("Second."));
    }

    #[tokio::test]
    async fn test_reduce_failure_falls_back_to_top_partial() {
        let llm = Arc::new(CountingLLM::new(
            &[("s0", Ok("Weak.\nScore: 10")), ("s1", Ok("Strong.\nScore: 95"))],
            Err("overloaded"),
        ));

        let result = answerer(llm, 16)
            .answer("q", &[record(0, "s0"), record(1, "s1")])
            .await
            .unwrap();

        assert_eq!(result.final_answer, "Strong.");
    }

    #[tokio::test]
    async fn test_failed_summaries_are_not_consulted() {
        let llm = Arc::new(CountingLLM::new(&[("s1", Ok("Useful.\nScore: 60"))], Ok("Final.")));

        let result = answerer(llm.clone(), 16)
            .answer("q", &[record(0, SUMMARY_FAILED), record(1, "s1")])
            .await
            .unwrap();

        assert_eq!(result.communities_consulted, 1);
        assert_eq!(llm.map_calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.final_answer, "Final.");
    }

    #[tokio::test]
    async fn test_empty_records_is_fatal() {
        let llm = Arc::new(CountingLLM::new(&[], Ok("unused")));

        let result = answerer(llm.clone(), 16).answer("q", &[]).await;
        assert!(matches!(result, Err(GraphRagError::EmptyInput(_))));
        assert_eq!(llm.map_calls.load(Ordering::SeqCst), 0);
        assert_eq!(llm.reduce_calls.load(Ordering::SeqCst), 0);
    }
}
