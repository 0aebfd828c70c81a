//! Curator command parsing.
//!
//! A command is the two whitespace-separated words following the bot's
//! mention: `@bot star 4`, `@bot abuse spam`, `@bot abuse tag`.

/// Parsed intent of a mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Star rating, already clamped into `1..=5`.
    Star(u8),
    AbuseSpam,
    AbuseTag,
    Invalid,
}

impl Command {
    /// Parse a reply body addressed to `bot`.
    ///
    /// The body must name the bot exactly once, and the mention must be
    /// followed by whitespace. Anything unrecognized is `Invalid`.
    pub fn parse(body: &str, bot: &str) -> Self {
        let mention = format!("@{}", bot);
        let mut segments = body.split(mention.as_str());
        let (Some(_), Some(rest), None) = (segments.next(), segments.next(), segments.next()) else {
            return Command::Invalid;
        };
        if !rest.starts_with(char::is_whitespace) {
            return Command::Invalid;
        }

        let mut words = rest.split_whitespace();
        let (Some(command), Some(argument)) = (words.next(), words.next()) else {
            return Command::Invalid;
        };
        let argument = argument.to_lowercase();

        match command.to_lowercase().as_str() {
            "star" => match argument.parse::<i64>() {
                Ok(n) => Command::Star(n.clamp(1, 5) as u8),
                Err(_) => Command::Invalid,
            },
            "abuse" => match argument.as_str() {
                "spam" => Command::AbuseSpam,
                "tag" => Command::AbuseTag,
                _ => Command::Invalid,
            },
            _ => Command::Invalid,
        }
    }
}
