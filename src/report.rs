//! Markdown production report for a project.

use std::fmt::Write;

use chrono::NaiveDate;

use crate::project::model::{EntitySet, Project, Scope};

/// Renders the production report. Returns `(filename, markdown)`.
pub fn production_report(project: &Project, date: NaiveDate) -> (String, String) {
    let subject = report_subject(project);
    let filename = format!("IdeaLab_Report_{}_{}.md", date.format("%Y-%m-%d"), file_safe(&subject));

    let mut md = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut md, project, &subject, date);
    (filename, md)
}

fn report_subject(project: &Project) -> String {
    [&project.episode_name, &project.series_name]
        .into_iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or("Untitled")
        .to_string()
}

fn file_safe(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn write_report(out: &mut String, project: &Project, subject: &str, date: NaiveDate) -> std::fmt::Result {
    writeln!(out, "# Production Report: {}", subject)?;
    writeln!(out)?;
    writeln!(out, "- Date: {}", date.format("%Y-%m-%d"))?;
    if !project.series_name.is_empty() {
        writeln!(out, "- Series: {}", project.series_name)?;
    }
    if !project.episode_name.is_empty() {
        writeln!(out, "- Episode: {}", project.episode_name)?;
    }
    writeln!(out, "- Aspect ratio: {}", project.aspect_ratio)?;
    writeln!(
        out,
        "- Runtime: {:.1}s estimated / {}s target",
        project.estimated_runtime(),
        project.target_duration
    )?;
    writeln!(
        out,
        "- Cuts confirmed: {}/{}",
        project.confirmed_cut_count(),
        project.script.len()
    )?;

    if !project.story.trim().is_empty() {
        writeln!(out, "\n## Story\n\n{}", project.story.trim())?;
    }
    if !project.master_style.description.trim().is_empty() {
        writeln!(out, "\n## Visual Style\n\n{}", project.master_style.description.trim())?;
    }

    for scope in [Scope::Series, Scope::Episode] {
        let set = project.entities(scope);
        if entity_count(set) == 0 {
            continue;
        }
        let title = match scope {
            Scope::Series => "Series Cast & Places",
            Scope::Episode => "Episode Cast & Places",
        };
        writeln!(out, "\n## {}\n", title)?;
        for (label, rows) in [
            ("Characters", ordered(&set.character_order, |id| set.characters.get(id).map(|e| (&e.name, &e.description)))),
            ("Locations", ordered(&set.location_order, |id| set.locations.get(id).map(|e| (&e.name, &e.description)))),
            ("Props", ordered(&set.prop_order, |id| set.props.get(id).map(|e| (&e.name, &e.description)))),
        ] {
            if rows.is_empty() {
                continue;
            }
            writeln!(out, "### {}\n", label)?;
            for (name, description) in rows {
                if description.is_empty() {
                    writeln!(out, "- **{}**", name)?;
                } else {
                    writeln!(out, "- **{}**: {}", name, description)?;
                }
            }
            writeln!(out)?;
        }
    }

    if !project.script.is_empty() {
        writeln!(out, "\n## Script\n")?;
        writeln!(out, "| # | Speaker | Dialogue | Duration | Status |")?;
        writeln!(out, "|---|---------|----------|----------|--------|")?;
        for (i, cut) in project.script.iter().enumerate() {
            let status = if cut.is_confirmed() { "confirmed" } else { "pending" };
            writeln!(
                out,
                "| {} | {} | {} | {:.1}s | {} |",
                i + 1,
                table_cell(&cut.speaker),
                table_cell(&cut.dialogue),
                cut.estimated_duration,
                status
            )?;
        }
    }
    Ok(())
}

fn entity_count(set: &EntitySet) -> usize {
    set.characters.len() + set.locations.len() + set.props.len()
}

/// Entities in display order; ids missing from the map are skipped.
fn ordered<'a, F>(order: &'a [String], lookup: F) -> Vec<(&'a String, &'a String)>
where
    F: Fn(&str) -> Option<(&'a String, &'a String)>,
{
    order.iter().filter_map(|id| lookup(id)).collect()
}

fn table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::model::{Character, Location, ScriptCut};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_filename_uses_episode_then_series() {
        let p = Project::new("p").with_series_name("Sea Glass").with_episode_name("Ep 1: Tide");
        assert_eq!(production_report(&p, date()).0, "IdeaLab_Report_2024-05-01_Ep_1__Tide.md");

        let p = Project::new("p").with_series_name("Sea Glass");
        assert_eq!(production_report(&p, date()).0, "IdeaLab_Report_2024-05-01_Sea_Glass.md");

        let p = Project::new("p");
        assert_eq!(production_report(&p, date()).0, "IdeaLab_Report_2024-05-01_Untitled.md");
    }

    #[test]
    fn test_report_sections() {
        let mut p = Project::new("p")
            .with_series_name("Sea Glass")
            .with_story("Two siblings run a beach cafe.")
            .with_cut(
                ScriptCut::new("c1")
                    .with_line("June", "Open | close?")
                    .with_duration(2.0),
            );
        let set = p.entities_mut(Scope::Series);
        set.characters.insert("a".into(), Character::new("a", "June").with_description("older sister"));
        set.character_order.push("a".into());
        set.locations.insert("l".into(), Location::new("l", "Cafe"));
        set.location_order.push("l".into());

        let (_, md) = production_report(&p, date());
        assert!(md.starts_with("# Production Report: Sea Glass\n"));
        assert!(md.contains("## Story\n\nTwo siblings run a beach cafe."));
        assert!(md.contains("- **June**: older sister"));
        assert!(md.contains("- **Cafe**\n"));
        assert!(md.contains("| 1 | June | Open \\| close? | 2.0s | pending |"));
        assert!(md.contains("- Cuts confirmed: 0/1"));
        assert!(!md.contains("Episode Cast"));
    }
}
