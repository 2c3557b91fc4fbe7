const DOI_PREFIXES: [&str; 5] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// Lowercases a DOI and strips resolver prefixes. Blank input yields `None`.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut doi = raw.trim().to_lowercase();
    for prefix in DOI_PREFIXES {
        if let Some(rest) = doi.strip_prefix(prefix) {
            doi = rest.trim().to_string();
            break;
        }
    }
    if doi.is_empty() {
        None
    } else {
        Some(doi)
    }
}

pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric(), " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts a comparable surname from `Surname, Initials` or `Surname Initials`.
pub fn first_author_surname(author: &str) -> String {
    let author = author.trim();
    let surname = match author.split_once(',') {
        Some((surname, _)) => surname.to_string(),
        None => {
            let tokens: Vec<&str> = author.split_whitespace().collect();
            match tokens.split_last() {
                Some((last, rest)) if !rest.is_empty() && looks_like_initials(last) => {
                    rest.join(" ")
                }
                _ => author.to_string(),
            }
        }
    };
    surname
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn looks_like_initials(token: &str) -> bool {
    let letters: Vec<char> = token.chars().filter(|c| *c != '.').collect();
    !letters.is_empty() && letters.len() <= 3 && letters.iter().all(|c| c.is_uppercase())
}
