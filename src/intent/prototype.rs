//! 임베딩 프로토타입 의도 분류기
//!
//! 항목마다 합성 학습 문장을 정규화/임베딩한 뒤 평균을 내어 프로토타입으로 씁니다.
//! 질의 임베딩과 각 프로토타입의 코사인 유사도를 온도 softmax로 확률 분포로 바꾸고
//! 최댓값 항목과 그 확률을 예측으로 반환합니다.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::knowledge::{cosine_similarity, ItemId, KnowledgeBase, KnowledgeItem, Normalizer};

use super::{phrases::training_phrases, IntentClassifier, IntentPrediction};

/// 프로토타입 분류기 설정
#[derive(Debug, Clone)]
pub struct PrototypeConfig {
    /// 항목당 임베딩할 최대 학습 문장 수 (API 호출 수 제한)
    pub max_phrases_per_item: usize,
    /// softmax 온도 (작을수록 분포가 뾰족해짐)
    pub temperature: f32,
}

impl Default for PrototypeConfig {
    fn default() -> Self {
        Self {
            max_phrases_per_item: 8,
            temperature: 0.05,
        }
    }
}

/// 프로토타입 분류기
pub struct PrototypeClassifier<E> {
    embedder: E,
    prototypes: Vec<(ItemId, Vec<f32>)>,
    temperature: f32,
}

impl<E: EmbeddingProvider> PrototypeClassifier<E> {
    /// 지식베이스로 프로토타입 학습
    ///
    /// 임베딩 호출이 실패하면 에러를 반환합니다 (시작 중단).
    pub async fn train(
        embedder: E,
        kb: &KnowledgeBase,
        normalizer: &Normalizer,
        config: PrototypeConfig,
    ) -> Result<Self> {
        let dimension = embedder.dimension();
        let mut prototypes = Vec::with_capacity(kb.len());

        for item in kb.iter() {
            let texts = training_texts(item, normalizer, config.max_phrases_per_item);
            let embeddings = embedder
                .embed_batch(&texts)
                .await
                .with_context(|| format!("Failed to embed training phrases for item {}", item.id))?;

            if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
                anyhow::bail!(
                    "Embedding dimension mismatch for item {}: expected {}, got {}",
                    item.id,
                    dimension,
                    bad.len()
                );
            }

            prototypes.push((item.id.clone(), mean(&embeddings, dimension)));
        }

        tracing::info!(
            "Trained intent prototypes: {} items via {}",
            prototypes.len(),
            embedder.name()
        );

        Ok(Self::from_prototypes(embedder, prototypes, config.temperature))
    }

    /// 미리 계산된 프로토타입으로 생성
    pub fn from_prototypes(embedder: E, prototypes: Vec<(ItemId, Vec<f32>)>, temperature: f32) -> Self {
        Self {
            embedder,
            prototypes,
            temperature,
        }
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    /// 프로토타입 순서의 확률 분포
    fn probabilities(&self, embedding: &[f32]) -> Vec<f32> {
        let logits: Vec<f32> = self
            .prototypes
            .iter()
            .map(|(_, prototype)| cosine_similarity(embedding, prototype) / self.temperature)
            .collect();
        softmax(&logits)
    }
}

#[async_trait]
impl<E: EmbeddingProvider> IntentClassifier for PrototypeClassifier<E> {
    async fn classify(&self, tokens: &[String]) -> Result<IntentPrediction> {
        if self.prototypes.is_empty() {
            anyhow::bail!("No intent prototypes loaded");
        }

        let embedding = self.embedder.embed(&tokens.join(" ")).await?;
        let probs = self.probabilities(&embedding);

        // 동점이면 먼저 나온 항목
        let (best, confidence) = probs
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });

        Ok(IntentPrediction {
            item_id: self.prototypes[best].0.clone(),
            confidence,
        })
    }

    fn name(&self) -> &str {
        "embedding-prototype"
    }
}

/// 항목 하나의 임베딩 대상 문장 (정규화 후, 최대 `max`개)
///
/// 학습 문장이 모두 비면 색인용 원문으로 대신합니다.
fn training_texts(item: &KnowledgeItem, normalizer: &Normalizer, max: usize) -> Vec<String> {
    let mut texts: Vec<String> = training_phrases(item)
        .iter()
        .map(|phrase| normalizer.normalize(phrase).join(" "))
        .filter(|text| !text.is_empty())
        .take(max)
        .collect();

    if texts.is_empty() {
        let fallback = normalizer.normalize(&item.document_text()).join(" ");
        if !fallback.is_empty() {
            texts.push(fallback);
        }
    }
    texts
}

/// 학습에 필요한 임베딩 호출 수
pub fn planned_embedding_calls(
    kb: &KnowledgeBase,
    normalizer: &Normalizer,
    config: &PrototypeConfig,
) -> usize {
    kb.iter()
        .map(|item| training_texts(item, normalizer, config.max_phrases_per_item).len())
        .sum()
}

fn mean(vectors: &[Vec<f32>], dimension: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; dimension];
    if vectors.is_empty() {
        return sum;
    }
    for vector in vectors {
        for (acc, x) in sum.iter_mut().zip(vector) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    sum.iter_mut().for_each(|x| *x /= n);
    sum
}

/// 수치 안정 softmax
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const VOCAB: [&str; 4] = ["banho", "higiene", "diabetes", "alimentação"];

    /// 고정 어휘 bag-of-words 임베딩
    struct BagOfWords;

    #[async_trait]
    impl EmbeddingProvider for BagOfWords {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; VOCAB.len()];
            for word in text.split_whitespace() {
                if let Some(i) = VOCAB.iter().position(|w| *w == word) {
                    v[i] += 1.0;
                }
            }
            Ok(v)
        }

        fn dimension(&self) -> usize {
            VOCAB.len()
        }

        fn name(&self) -> &str {
            "bag-of-words"
        }
    }

    struct Failing;

    #[async_trait]
    impl EmbeddingProvider for Failing {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("model unavailable")
        }

        fn dimension(&self) -> usize {
            4
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn kb() -> KnowledgeBase {
        KnowledgeBase::from_json_str(
            r#"[
                {"id": 1, "topic": "Banho", "content": "Banho e higiene do idoso.", "keywords": ["higiene"]},
                {"id": 2, "topic": "Diabetes", "content": "Diabetes e alimentação do idoso.", "keywords": ["alimentação"]}
            ]"#,
        )
        .unwrap()
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(String::from).collect()
    }

    #[tokio::test]
    async fn test_train_and_classify() {
        let classifier = PrototypeClassifier::train(
            BagOfWords,
            &kb(),
            &Normalizer::default(),
            PrototypeConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(classifier.len(), 2);

        let prediction = classifier.classify(&tokens("diabetes alimentação")).await.unwrap();
        assert_eq!(prediction.item_id, ItemId::from(2));
        assert!(prediction.confidence > 0.6);

        let prediction = classifier.classify(&tokens("banho higiene")).await.unwrap();
        assert_eq!(prediction.item_id, ItemId::from(1));
    }

    #[tokio::test]
    async fn test_keyword_only_query_routes_to_item() {
        let classifier = PrototypeClassifier::train(
            BagOfWords,
            &kb(),
            &Normalizer::default(),
            PrototypeConfig::default(),
        )
        .await
        .unwrap();

        // 주제 템플릿에는 없는 키워드
        let prediction = classifier.classify(&tokens("higiene")).await.unwrap();
        assert_eq!(prediction.item_id, ItemId::from(1));
        assert!(prediction.confidence > 0.6);

        let prediction = classifier.classify(&tokens("alimentação")).await.unwrap();
        assert_eq!(prediction.item_id, ItemId::from(2));
        assert!(prediction.confidence > 0.6);
    }

    #[tokio::test]
    async fn test_empty_query_is_uniform() {
        let classifier = PrototypeClassifier::train(
            BagOfWords,
            &kb(),
            &Normalizer::default(),
            PrototypeConfig::default(),
        )
        .await
        .unwrap();

        let prediction = classifier.classify(&[]).await.unwrap();
        assert!((prediction.confidence - 0.5).abs() < 1e-6);
        assert_eq!(prediction.item_id, ItemId::from(1));
    }

    #[tokio::test]
    async fn test_deterministic() {
        let classifier = PrototypeClassifier::train(
            BagOfWords,
            &kb(),
            &Normalizer::default(),
            PrototypeConfig::default(),
        )
        .await
        .unwrap();

        let a = classifier.classify(&tokens("banho")).await.unwrap();
        let b = classifier.classify(&tokens("banho")).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_training_failure_is_error() {
        let result = PrototypeClassifier::train(
            Failing,
            &kb(),
            &Normalizer::default(),
            PrototypeConfig::default(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_no_prototypes_is_error() {
        let classifier = PrototypeClassifier::from_prototypes(BagOfWords, vec![], 0.05);
        assert!(classifier.is_empty());
        assert!(classifier.classify(&tokens("banho")).await.is_err());
    }

    #[test]
    fn test_planned_embedding_calls() {
        let normalizer = Normalizer::default();
        let config = PrototypeConfig::default();
        assert_eq!(planned_embedding_calls(&kb(), &normalizer, &config), 2 * 8);

        let one = PrototypeConfig {
            max_phrases_per_item: 1,
            ..PrototypeConfig::default()
        };
        assert_eq!(planned_embedding_calls(&kb(), &normalizer, &one), 2);
        assert_eq!(
            planned_embedding_calls(&KnowledgeBase::default(), &normalizer, &config),
            0
        );
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_mean() {
        let m = mean(&[vec![1.0, 0.0], vec![3.0, 2.0]], 2);
        assert_eq!(m, vec![2.0, 1.0]);
        assert_eq!(mean(&[], 2), vec![0.0, 0.0]);
    }
}
