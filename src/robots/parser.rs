//! Crawl-delay extraction from robots.txt
//!
//! The robotstxt crate answers allow/disallow queries but does not expose
//! the non-standard `Crawl-delay` directive, so that part is parsed by
//! hand. Grouping follows the usual convention: consecutive `User-agent`
//! lines open a group, any other directive belongs to the group, and a
//! `User-agent` line after other directives starts a new group. When a
//! specific user-agent group matches, the `*` group is ignored entirely.

/// Extracts the crawl delay (in seconds) that applies to `user_agent`.
///
/// # Returns
///
/// * `Some(f64)` - Delay declared for the matching group
/// * `None` - No applicable `Crawl-delay` directive
pub fn crawl_delay(content: &str, user_agent: &str) -> Option<f64> {
    let agent = user_agent.to_lowercase();

    let mut specific_match = false;
    let mut specific_delay: Option<f64> = None;
    let mut wildcard_delay: Option<f64> = None;

    // Per-group state while scanning line by line.
    let mut group_agents: Vec<String> = Vec::new();
    let mut in_group_header = false;

    for line in content.lines() {
        // Strip comments, then whitespace.
        let line = match line.split_once('#') {
            Some((before, _)) => before.trim(),
            None => line.trim(),
        };
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if !in_group_header {
                    group_agents.clear();
                    in_group_header = true;
                }
                group_agents.push(value.to_lowercase());
            }
            "crawl-delay" => {
                in_group_header = false;
                let Ok(delay) = value.parse::<f64>() else {
                    continue;
                };
                if group_agents.iter().any(|g| g != "*" && agent.contains(g.as_str())) {
                    specific_delay = Some(delay);
                } else if group_agents.iter().any(|g| g == "*") {
                    wildcard_delay = Some(delay);
                }
            }
            _ => {
                in_group_header = false;
            }
        }

        // Track whether any group names this agent specifically, even when
        // the group declares no delay: a matched group shadows `*`.
        if !in_group_header
            && group_agents.iter().any(|g| g != "*" && agent.contains(g.as_str()))
        {
            specific_match = true;
        }
    }

    if specific_match {
        specific_delay
    } else {
        wildcard_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_delay() {
        let content = "User-agent: *\nCrawl-delay: 10\nDisallow: /admin";
        assert_eq!(crawl_delay(content, "TestBot"), Some(10.0));
        assert_eq!(crawl_delay(content, "AnyBot"), Some(10.0));
    }

    #[test]
    fn test_specific_agent_delay() {
        let content = "User-agent: TestBot\nCrawl-delay: 5\n\nUser-agent: *\nCrawl-delay: 10";
        assert_eq!(crawl_delay(content, "TestBot"), Some(5.0));
        assert_eq!(crawl_delay(content, "OtherBot"), Some(10.0));
    }

    #[test]
    fn test_matched_group_shadows_wildcard() {
        // TestBot's own group has no delay, so it gets none at all.
        let content = "User-agent: TestBot\nDisallow: /x\n\nUser-agent: *\nCrawl-delay: 10";
        assert_eq!(crawl_delay(content, "TestBot"), None);
        assert_eq!(crawl_delay(content, "OtherBot"), Some(10.0));
    }

    #[test]
    fn test_no_delay() {
        let content = "User-agent: *\nDisallow: /admin";
        assert_eq!(crawl_delay(content, "TestBot"), None);
    }

    #[test]
    fn test_decimal_delay() {
        let content = "User-agent: *\nCrawl-delay: 2.5";
        assert_eq!(crawl_delay(content, "TestBot"), Some(2.5));
    }

    #[test]
    fn test_case_insensitive() {
        let content = "User-agent: TestBot\ncrawl-delay: 7";
        assert_eq!(crawl_delay(content, "testbot"), Some(7.0));
        assert_eq!(crawl_delay(content, "TESTBOT"), Some(7.0));
    }

    #[test]
    fn test_product_token_matches_group() {
        let content = "User-agent: TestBot\nCrawl-delay: 3";
        assert_eq!(crawl_delay(content, "TestBot/1.0"), Some(3.0));
    }

    #[test]
    fn test_multiple_agents_per_group() {
        let content = "User-agent: BotA\nUser-agent: BotB\nCrawl-delay: 3";
        assert_eq!(crawl_delay(content, "BotA"), Some(3.0));
        assert_eq!(crawl_delay(content, "BotB"), Some(3.0));
        assert_eq!(crawl_delay(content, "BotC"), None);
    }

    #[test]
    fn test_directives_split_groups() {
        // The Disallow line closes the first group, so BotB is a new group.
        let content = "User-agent: BotA\nDisallow: /a\nUser-agent: BotB\nCrawl-delay: 4";
        assert_eq!(crawl_delay(content, "BotA"), None);
        assert_eq!(crawl_delay(content, "BotB"), Some(4.0));
    }

    #[test]
    fn test_comments_and_garbage_ignored() {
        let content = "# welcome\nUser-agent: * # everyone\nCrawl-delay: 6\nnot a directive";
        assert_eq!(crawl_delay(content, "TestBot"), Some(6.0));
    }

    #[test]
    fn test_unparsable_delay_ignored() {
        let content = "User-agent: *\nCrawl-delay: soon";
        assert_eq!(crawl_delay(content, "TestBot"), None);
    }

    #[test]
    fn test_empty_content() {
        assert_eq!(crawl_delay("", "TestBot"), None);
    }
}
