use anyhow::Result;
use regex::Regex;
use std::sync::OnceLock;

use super::prompt::Prompter;
use crate::domain::models::{ExternalId, MediaMetadata, Movie, TvEpisode};

/// Asks the operator to classify a file by hand. `None` means the operator's
/// input ran out before every required field was given.
pub fn manual_entry(prompter: &mut dyn Prompter, id_source: &str) -> Result<Option<MediaMetadata>> {
    loop {
        let Some(kind) = prompter.ask("Is this a (m)ovie or (t)v episode? [m/t]: ")? else {
            return Ok(None);
        };
        match kind.to_lowercase().as_str() {
            "" | "m" | "movie" => return manual_movie(prompter, id_source),
            "t" | "tv" => return manual_tv(prompter, id_source),
            _ => eprintln!("Please enter 'm' or 't'."),
        }
    }
}

fn manual_movie(prompter: &mut dyn Prompter, id_source: &str) -> Result<Option<MediaMetadata>> {
    eprintln!("\nManual: Movie");
    let Some(title) = ask_required(prompter, "  Title: ")? else {
        return Ok(None);
    };
    let Some(year) = ask_year(prompter, "  Year (YYYY): ")? else {
        return Ok(None);
    };
    let Some(external_id) = ask_external_id(prompter, id_source)? else {
        return Ok(None);
    };

    Ok(Some(MediaMetadata::Movie(Movie {
        title,
        year,
        external_id,
    })))
}

fn manual_tv(prompter: &mut dyn Prompter, id_source: &str) -> Result<Option<MediaMetadata>> {
    eprintln!("\nManual: TV");
    let Some(series_title) = ask_required(prompter, "  Series Title: ")? else {
        return Ok(None);
    };
    let Some(year) = ask_year(prompter, "  Year (YYYY): ")? else {
        return Ok(None);
    };
    let Some(season) = ask_positive(prompter, "  Season #: ")? else {
        return Ok(None);
    };
    let Some(episode) = ask_positive(prompter, "  Episode #: ")? else {
        return Ok(None);
    };
    let Some(episode_title) = prompter.ask("  Episode Title (optional; Enter to skip): ")? else {
        return Ok(None);
    };
    let Some(external_id) = ask_external_id(prompter, id_source)? else {
        return Ok(None);
    };

    Ok(Some(MediaMetadata::TvEpisode(TvEpisode {
        series_title,
        year,
        season,
        episode,
        episode_title: (!episode_title.is_empty()).then_some(episode_title),
        external_id,
    })))
}

fn ask_required(prompter: &mut dyn Prompter, prompt: &str) -> Result<Option<String>> {
    loop {
        match prompter.ask(prompt)? {
            None => return Ok(None),
            Some(answer) if answer.is_empty() => eprintln!("  A value is required."),
            Some(answer) => return Ok(Some(answer)),
        }
    }
}

fn four_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}$").unwrap())
}

fn ask_year(prompter: &mut dyn Prompter, prompt: &str) -> Result<Option<u16>> {
    loop {
        let Some(answer) = prompter.ask(prompt)? else {
            return Ok(None);
        };
        match answer.parse() {
            Ok(year) if four_digits().is_match(&answer) => return Ok(Some(year)),
            _ => eprintln!("  Valid 4-digit year required."),
        }
    }
}

fn ask_positive(prompter: &mut dyn Prompter, prompt: &str) -> Result<Option<u32>> {
    loop {
        let Some(answer) = prompter.ask(prompt)? else {
            return Ok(None);
        };
        match answer.parse::<u32>() {
            Ok(n) if n > 0 => return Ok(Some(n)),
            _ => eprintln!("  A positive whole number is required."),
        }
    }
}

/// Outer `None`: input exhausted. Inner `None`: operator skipped the id.
fn ask_external_id(prompter: &mut dyn Prompter, id_source: &str) -> Result<Option<Option<ExternalId>>> {
    let prompt = format!("  {} id (optional digits; Enter to skip): ", id_source.to_uppercase());
    loop {
        let Some(answer) = prompter.ask(&prompt)? else {
            return Ok(None);
        };
        if answer.is_empty() {
            return Ok(Some(None));
        }
        if answer.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Some(Some(ExternalId::new(id_source, &answer))));
        }
        eprintln!("  The id must be digits only.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::prompt::LinePrompter;

    #[test]
    fn test_manual_movie() {
        let mut prompter = LinePrompter::scripted("m\nWell Formatted Movie Title\n2020\n123456\n");
        let meta = manual_entry(&mut prompter, "tmdb").unwrap();
        assert_eq!(
            meta,
            Some(MediaMetadata::Movie(Movie {
                title: "Well Formatted Movie Title".to_string(),
                year: 2020,
                external_id: Some(ExternalId::new("tmdb", "123456")),
            }))
        );
    }

    #[test]
    fn test_manual_tv_reprompts_invalid_fields() {
        let mut prompter = LinePrompter::scripted(
            "x\nt\n\nBadly Formatted TV Show\n15\nnineteen\n2015\n0\n1\n-1\n1\nThe Pilot\nabc\n654321\n",
        );
        let meta = manual_entry(&mut prompter, "tmdb").unwrap();
        assert_eq!(
            meta,
            Some(MediaMetadata::TvEpisode(TvEpisode {
                series_title: "Badly Formatted TV Show".to_string(),
                year: 2015,
                season: 1,
                episode: 1,
                episode_title: Some("The Pilot".to_string()),
                external_id: Some(ExternalId::new("tmdb", "654321")),
            }))
        );
    }

    #[test]
    fn test_optional_fields_can_be_skipped() {
        let mut prompter = LinePrompter::scripted("t\nShow\n2001\n2\n3\n\n\n");
        let Some(MediaMetadata::TvEpisode(episode)) = manual_entry(&mut prompter, "tmdb").unwrap() else {
            panic!("expected an episode");
        };
        assert_eq!(episode.episode_title, None);
        assert_eq!(episode.external_id, None);

        // Empty type selector defaults to movie.
        let mut prompter = LinePrompter::scripted("\nHeat\n1995\n\n");
        let meta = manual_entry(&mut prompter, "tmdb").unwrap();
        assert!(matches!(meta, Some(MediaMetadata::Movie(ref m)) if m.external_id.is_none()));
    }

    #[test]
    fn test_end_of_input_aborts() {
        let mut prompter = LinePrompter::scripted("m\nHeat\n19");
        assert_eq!(manual_entry(&mut prompter, "tmdb").unwrap(), None);

        let mut prompter = LinePrompter::scripted("");
        assert_eq!(manual_entry(&mut prompter, "tmdb").unwrap(), None);
    }
}
