//! 합성 학습 문장 생성
//!
//! 항목마다 주제/키워드를 질문 템플릿에 넣고, 본문 앞 문장 두 개를 더합니다.

use crate::knowledge::KnowledgeItem;

const TOPIC_TEMPLATES: &[&str] = &[
    "O que é {}?",
    "Explique {}",
    "Como lidar com {}?",
    "Dicas para {}",
    "Cuidados com {}",
    "O que fazer sobre {}?",
    "{} em idosos",
    "Como prevenir {}?",
    "Informações sobre {}",
    "Cuidados relacionados a {}",
    "Como ajudar com {}?",
    "O que significa {} no cuidado de idosos?",
];

const KEYWORD_TEMPLATES: &[&str] = &[
    "O que significa {}?",
    "Como prevenir {}?",
    "Cuidados com {}",
    "{} em idosos",
];

/// 본문에서 가져올 문장 수
const CONTENT_SENTENCES: usize = 2;

/// 항목의 합성 학습 문장
///
/// 주제, 키워드, 본문 세 그룹을 번갈아 가며 나열합니다.
/// 앞부분만 잘라 써도 세 그룹이 모두 포함됩니다.
pub fn training_phrases(item: &KnowledgeItem) -> Vec<String> {
    let topic: Vec<String> = TOPIC_TEMPLATES
        .iter()
        .map(|t| t.replace("{}", &item.topic))
        .collect();

    let mut keyword: Vec<String> = Vec::new();
    if !item.keywords.is_empty() {
        keyword.push(item.keywords.join(" "));
    }
    for kw in &item.keywords {
        keyword.extend(KEYWORD_TEMPLATES.iter().map(|t| t.replace("{}", kw)));
    }

    let content: Vec<String> = item
        .content
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(CONTENT_SENTENCES)
        .map(String::from)
        .collect();

    interleave(vec![topic, keyword, content])
}

/// 그룹을 라운드 로빈으로 합침
fn interleave(groups: Vec<Vec<String>>) -> Vec<String> {
    let total = groups.iter().map(Vec::len).sum();
    let mut merged = Vec::with_capacity(total);
    let mut iters: Vec<_> = groups.into_iter().map(Vec::into_iter).collect();
    while merged.len() < total {
        for it in iters.iter_mut() {
            if let Some(phrase) = it.next() {
                merged.push(phrase);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::ItemId;

    fn item() -> KnowledgeItem {
        KnowledgeItem {
            id: ItemId::from(1),
            topic: "Banho".to_string(),
            module: None,
            content: "Teste a temperatura da água. Use cadeira de banho! Seque bem a pele.".to_string(),
            keywords: vec!["higiene".to_string(), "banho".to_string()],
        }
    }

    #[test]
    fn test_phrase_counts() {
        let phrases = training_phrases(&item());
        // 12 topic + 1 keyword line + 2 * 4 keyword + 2 sentences
        assert_eq!(phrases.len(), 12 + 1 + 8 + 2);
    }

    #[test]
    fn test_groups_interleaved() {
        let phrases = training_phrases(&item());
        assert_eq!(phrases[0], "O que é Banho?");
        assert_eq!(phrases[1], "higiene banho");
        assert_eq!(phrases[2], "Teste a temperatura da água.");
        assert_eq!(phrases[3], "Explique Banho");
        assert_eq!(phrases[4], "O que significa higiene?");
        assert_eq!(phrases[5], "Use cadeira de banho!");
        // 본문이 소진된 뒤에는 주제/키워드만 번갈아
        assert_eq!(phrases[6], "Como lidar com Banho?");
        assert_eq!(phrases[7], "Como prevenir higiene?");
    }

    #[test]
    fn test_prefix_covers_every_group() {
        let phrases = training_phrases(&item());
        let head = &phrases[..8];
        assert!(head.iter().any(|p| p.contains("higiene")));
        assert!(head.iter().any(|p| p.starts_with("Teste a temperatura")));
        assert_eq!(phrases.last().map(String::as_str), Some("O que significa Banho no cuidado de idosos?"));
    }

    #[test]
    fn test_no_keywords() {
        let mut item = item();
        item.keywords.clear();
        let phrases = training_phrases(&item);
        assert_eq!(phrases.len(), 12 + 2);
        assert_eq!(phrases[1], "Teste a temperatura da água.");
    }

    #[test]
    fn test_interleave_uneven() {
        let groups = vec![
            vec!["a1".to_string(), "a2".to_string(), "a3".to_string()],
            vec![],
            vec!["c1".to_string()],
        ];
        assert_eq!(interleave(groups), ["a1", "c1", "a2", "a3"]);
    }
}
