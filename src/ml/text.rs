use lazy_static::lazy_static;
use std::collections::HashSet;

lazy_static! {
    /// English stop words excluded from the vocabulary
    static ref STOP_WORDS: HashSet<&'static str> = [
        "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
        "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
        "amongst", "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone",
        "anything", "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became",
        "because", "become", "becomes", "becoming", "been", "before", "beforehand", "behind",
        "being", "below", "beside", "besides", "between", "beyond", "bill", "both", "bottom",
        "but", "by", "call", "can", "cannot", "cant", "co", "con", "could", "couldnt", "cry",
        "de", "describe", "detail", "do", "done", "down", "due", "during", "each", "eg",
        "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "etc", "even",
        "ever", "every", "everyone", "everything", "everywhere", "except", "few", "fifteen",
        "fifty", "fill", "find", "fire", "first", "five", "for", "former", "formerly", "forty",
        "found", "four", "from", "front", "full", "further", "get", "give", "go", "had", "has",
        "hasnt", "have", "he", "hence", "her", "here", "hereafter", "hereby", "herein",
        "hereupon", "hers", "herself", "him", "himself", "his", "how", "however", "hundred",
        "i", "ie", "if", "in", "inc", "indeed", "interest", "into", "is", "it", "its", "itself",
        "keep", "last", "latter", "latterly", "least", "less", "ltd", "made", "many", "may",
        "me", "meanwhile", "might", "mill", "mine", "more", "moreover", "most", "mostly",
        "move", "much", "must", "my", "myself", "name", "namely", "neither", "never",
        "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
        "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
        "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
        "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem",
        "seemed", "seeming", "seems", "serious", "several", "she", "should", "show", "side",
        "since", "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something",
        "sometime", "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than",
        "that", "the", "their", "them", "themselves", "then", "thence", "there", "thereafter",
        "thereby", "therefore", "therein", "thereupon", "these", "they", "thick", "thin",
        "third", "this", "those", "though", "three", "through", "throughout", "thru", "thus",
        "to", "together", "too", "top", "toward", "towards", "twelve", "twenty", "two", "un",
        "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were",
        "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas",
        "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither",
        "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without",
        "would", "yet", "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect();
}

/// Text preprocessing shared by feature fitting and prediction serving.
///
/// Every path that turns ticket text into features goes through
/// [`TextPreprocessor::normalize`]; there is no second implementation.
pub struct TextPreprocessor;

impl TextPreprocessor {
    /// Canonicalize raw text: lowercase, keep only `a-z`, `0-9`, whitespace and
    /// `.,!?`, collapse whitespace runs to one space, trim.
    ///
    /// The ASCII information separators `\x1c`..=`\x1f` count as whitespace.
    pub fn normalize(text: &str) -> String {
        let kept: String = text
            .to_lowercase()
            .chars()
            .map(|c| if Self::is_separator(c) { ' ' } else { c })
            .filter(|c| {
                c.is_ascii_lowercase()
                    || c.is_ascii_digit()
                    || c.is_whitespace()
                    || matches!(c, '.' | ',' | '!' | '?')
            })
            .collect();

        kept.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn is_separator(c: char) -> bool {
        matches!(c, '\x1c'..='\x1f')
    }

    /// Null-tolerant variant: `None` yields an empty string.
    pub fn normalize_opt(text: Option<&str>) -> String {
        text.map(Self::normalize).unwrap_or_default()
    }

    /// The document text for a ticket: both fields normalized independently
    /// and joined by a single space.
    pub fn compose(subject: &str, description: &str) -> String {
        format!("{} {}", Self::normalize(subject), Self::normalize(description))
    }

    /// Split normalized text into word tokens of at least two alphanumeric characters.
    pub fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| w.len() >= 2)
            .map(|w| w.to_string())
            .collect()
    }

    /// Check membership in the English stop word list
    pub fn is_stop_word(token: &str) -> bool {
        STOP_WORDS.contains(token)
    }

    /// Build space-joined n-grams for every `n` in `min..=max`
    pub fn ngrams(tokens: &[String], range: (usize, usize)) -> Vec<String> {
        let (min_n, max_n) = range;
        let mut terms = Vec::new();

        for n in min_n.max(1)..=max_n {
            if n == 1 {
                terms.extend(tokens.iter().cloned());
                continue;
            }
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }

        terms
    }
}
