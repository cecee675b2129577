//! Prompt construction for batched answer extraction.

use std::fmt::Write as _;

use super::types::{ContextEntry, SENTINEL};

const EXTRACTION_PREAMBLE: &str = "\
あなたはOCRで読み取ったアンケート用紙から回答を整理するアシスタントです。
下の「質問リスト」の各質問について、「参考テキスト」から回答だけを取り出してください。";

/// Appended on the same-model retry after an unusable answer.
pub(crate) const STRICT_SUFFIX: &str = "\
重要: 出力はJSON配列だけにしてください。前置き・説明・コードブロックは禁止です。
例: [\"回答1\", \"回答2\"]";

/// Build the instruction block for one batch of questions.
///
/// Only the batch's own context snippets are embedded. Entries that share
/// a key and snippet (sub-questions reading their parent block) are
/// included once.
pub fn build_batch_prompt(batch: &[ContextEntry], strict: bool) -> String {
    let mut prompt = String::with_capacity(1_024 + batch.len() * 512);
    prompt.push_str(EXTRACTION_PREAMBLE);
    prompt.push_str("\n\nルール:\n");
    let _ = writeln!(
        prompt,
        "1. 出力は文字列のJSON配列のみ。要素数は質問数({})と同じにし、質問リストと同じ順序で並べる。",
        batch.len()
    );
    prompt.push_str(
        "2. 選択式の回答(○・丸囲み・チェック・凡例の番号や記号)は、選ばれた選択肢の文言に置き換える。\n",
    );
    prompt.push_str("3. 数値の回答は半角数字のみで返し、単位は付けない。\n");
    let _ = writeln!(
        prompt,
        "4. 未回答または読み取れない質問は \"{SENTINEL}\" とする。"
    );

    prompt.push_str("\n質問リスト:\n");
    for (i, entry) in batch.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, entry.label.trim());
    }

    prompt.push_str("\n参考テキスト:\n");
    let mut seen: Vec<(String, &str)> = Vec::with_capacity(batch.len());
    for entry in batch {
        let key = entry.key.to_string();
        if seen
            .iter()
            .any(|(k, snippet)| *k == key && *snippet == entry.snippet)
        {
            continue;
        }
        let _ = writeln!(prompt, "[{key}]\n{}\n---", entry.snippet.trim());
        seen.push((key, entry.snippet.as_str()));
    }

    if strict {
        prompt.push('\n');
        prompt.push_str(STRICT_SUFFIX);
    }
    prompt
}
