//! Query tokens that carry no retrieval signal.

/// Japanese particles, copulas and question fillers, plus common English
/// function words.
const STOPWORDS: &[&str] = &[
    // ja
    "は", "が", "を", "に", "へ", "で", "と", "の", "も", "や", "か", "な", "ね", "よ",
    "から", "まで", "より", "など", "って", "です", "ですか", "ます", "ますか", "でしょうか",
    "する", "します", "した", "して", "したら", "たら", "どう", "どうすれば", "どうしたら",
    "いい", "よい", "何", "なに", "なん", "どこ", "いつ", "だれ", "誰", "どれ", "どの",
    "こと", "もの", "ため", "について", "とは", "？", "?",
    // en
    "a", "an", "the", "is", "are", "was", "were", "be", "to", "of", "in", "on", "at",
    "for", "and", "or", "with", "by", "it", "this", "that", "what", "how", "when",
    "where", "who", "why", "do", "does", "i", "you", "we",
];

pub fn is_stopword(token: &str) -> bool {
    let lower = token.to_lowercase();
    STOPWORDS.contains(&lower.as_str())
}

/// Drops stopwords, keeping the order of the remaining tokens.
pub fn remove_stopwords<'a, I>(tokens: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    tokens.into_iter().filter(|t| !is_stopword(t)).collect()
}
