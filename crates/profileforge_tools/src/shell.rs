#![forbid(unsafe_code)]

use profileforge_engines::session_marker::SessionMarkerStore;
use profileforge_kernel_contracts::profile::{Education, EntryId, Profile, WorkExperience};
use profileforge_kernel_contracts::session::AuthOutcome;
use profileforge_os::auth::AuthRuntime;
use profileforge_storage::repo::ProfileRepo;

pub const HELP_TEXT: &str = "\
commands:
  register <email> <full name>
  login <email>
  logout
  whoami
  view <profile_id>
  set-name <full name>
  set-headline <text>
  set-bio <text>
  set-picture [url]
  set-link <linkedin|github|portfolio> [url]
  add-skill <skill>
  remove-skill <skill>
  add-work <company> | <role> | <start> [| <end> [| <description>]]
  remove-work <entry_id>
  add-education <institution> | <degree> | <start> [| <end> [| <description>]]
  remove-education <entry_id>
  help
  quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    LinkedIn,
    GitHub,
    Portfolio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryArgs {
    pub organisation: String,
    pub title: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Register { email: String, full_name: String },
    Login { email: String },
    Logout,
    WhoAmI,
    View { profile_id: String },
    SetName(String),
    SetHeadline(String),
    SetBio(String),
    SetPicture(Option<String>),
    SetLink { kind: LinkKind, url: Option<String> },
    AddSkill(String),
    RemoveSkill(String),
    AddWork(EntryArgs),
    RemoveWork { entry_id: String },
    AddEducation(EntryArgs),
    RemoveEducation { entry_id: String },
    Help,
    Quit,
}

/// What the caller must collect before executing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretPrompt {
    /// Secret plus a confirmation that must match.
    NewSecret,
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEntry {
    pub secret: String,
    pub confirm: Option<String>,
}

impl ShellCommand {
    /// Blank lines parse to `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let command = match verb {
            "register" => {
                let (email, full_name) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "usage: register <email> <full name>".to_string())?;
                Self::Register {
                    email: email.to_string(),
                    full_name: full_name.trim().to_string(),
                }
            }
            "login" => Self::Login {
                email: require_arg(rest, "usage: login <email>")?,
            },
            "logout" => Self::Logout,
            "whoami" => Self::WhoAmI,
            "view" => Self::View {
                profile_id: require_arg(rest, "usage: view <profile_id>")?,
            },
            "set-name" => Self::SetName(require_arg(rest, "usage: set-name <full name>")?),
            "set-headline" => Self::SetHeadline(require_arg(rest, "usage: set-headline <text>")?),
            "set-bio" => Self::SetBio(rest.to_string()),
            "set-picture" => Self::SetPicture(Some(rest.to_string()).filter(|v| !v.is_empty())),
            "set-link" => {
                let (kind, url) = match rest.split_once(char::is_whitespace) {
                    Some((kind, url)) => (kind, Some(url.trim().to_string())),
                    None => (rest, None),
                };
                let kind = match kind {
                    "linkedin" => LinkKind::LinkedIn,
                    "github" => LinkKind::GitHub,
                    "portfolio" => LinkKind::Portfolio,
                    _ => return Err("usage: set-link <linkedin|github|portfolio> [url]".to_string()),
                };
                Self::SetLink { kind, url }
            }
            "add-skill" => Self::AddSkill(require_arg(rest, "usage: add-skill <skill>")?),
            "remove-skill" => Self::RemoveSkill(require_arg(rest, "usage: remove-skill <skill>")?),
            "add-work" => Self::AddWork(parse_entry_args(
                rest,
                "usage: add-work <company> | <role> | <start> [| <end> [| <description>]]",
            )?),
            "remove-work" => Self::RemoveWork {
                entry_id: require_arg(rest, "usage: remove-work <entry_id>")?,
            },
            "add-education" => Self::AddEducation(parse_entry_args(
                rest,
                "usage: add-education <institution> | <degree> | <start> [| <end> [| <description>]]",
            )?),
            "remove-education" => Self::RemoveEducation {
                entry_id: require_arg(rest, "usage: remove-education <entry_id>")?,
            },
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => return Err(format!("unknown command: {verb}. type `help` for a list")),
        };
        Ok(Some(command))
    }

    pub fn needs_secret(&self) -> Option<SecretPrompt> {
        match self {
            Self::Register { .. } => Some(SecretPrompt::NewSecret),
            Self::Login { .. } => Some(SecretPrompt::Existing),
            _ => None,
        }
    }
}

fn require_arg(rest: &str, usage: &str) -> Result<String, String> {
    if rest.is_empty() {
        return Err(usage.to_string());
    }
    Ok(rest.to_string())
}

/// A blank end date means the entry is ongoing.
fn parse_entry_args(rest: &str, usage: &str) -> Result<EntryArgs, String> {
    let parts: Vec<&str> = rest.split('|').map(str::trim).collect();
    let (organisation, title, start_date, end_date, description) = match parts.as_slice() {
        [o, t, s] => (o, t, s, None, ""),
        [o, t, s, e] => (o, t, s, Some(e.to_string()), ""),
        [o, t, s, e, d] => (o, t, s, Some(e.to_string()), *d),
        _ => return Err(usage.to_string()),
    };
    Ok(EntryArgs {
        organisation: organisation.to_string(),
        title: title.to_string(),
        start_date: start_date.to_string(),
        end_date,
        description: description.to_string(),
    })
}

pub fn execute_shell_command<R, M>(
    runtime: &mut AuthRuntime<R, M>,
    command: &ShellCommand,
    secret: Option<&SecretEntry>,
) -> Result<String, String>
where
    R: ProfileRepo,
    M: SessionMarkerStore,
{
    match command {
        ShellCommand::Register { email, full_name } => {
            let entry = secret.ok_or_else(|| "missing secret input".to_string())?;
            if entry.confirm.as_deref() != Some(entry.secret.as_str()) {
                return Err("secrets do not match".to_string());
            }
            let outcome = runtime
                .register(email, &entry.secret, full_name)
                .map_err(|e| format!("registration failed: {e}"))?;
            Ok(format!(
                "Registered {} ({}). next: {}",
                outcome.profile.full_name,
                outcome.profile.id,
                outcome.navigate_to.route()
            ))
        }
        ShellCommand::Login { email } => {
            let entry = secret.ok_or_else(|| "missing secret input".to_string())?;
            let outcome = runtime
                .authenticate(email, &entry.secret)
                .map_err(|e| format!("login failed: {e}"))?;
            Ok(format!(
                "Welcome back, {}. next: {}",
                outcome.profile.full_name,
                outcome.navigate_to.route()
            ))
        }
        ShellCommand::Logout => {
            let next = runtime.logout();
            Ok(format!("Logged out. next: {}", next.route()))
        }
        ShellCommand::WhoAmI => match runtime.current_profile() {
            Some(profile) => Ok(format!(
                "{}\n\n{}",
                render_profile(profile),
                render_entry_ids(profile)
            )),
            None => Ok("Not signed in.".to_string()),
        },
        ShellCommand::View { profile_id } => runtime
            .fetch_profile(profile_id)
            .map(|profile| render_profile(&profile))
            .ok_or_else(|| "Profile not found.".to_string()),
        ShellCommand::SetName(name) => edit_profile(runtime, |p| {
            p.full_name = name.clone();
            Ok(())
        }),
        ShellCommand::SetPicture(url) => edit_profile(runtime, |p| {
            p.profile_picture_url = url.clone();
            Ok(())
        }),
        ShellCommand::SetHeadline(text) => edit_profile(runtime, |p| {
            p.headline = text.clone();
            Ok(())
        }),
        ShellCommand::SetBio(text) => edit_profile(runtime, |p| {
            p.bio = text.clone();
            Ok(())
        }),
        ShellCommand::SetLink { kind, url } => edit_profile(runtime, |p| {
            let slot = match kind {
                LinkKind::LinkedIn => &mut p.linkedin_url,
                LinkKind::GitHub => &mut p.github_url,
                LinkKind::Portfolio => &mut p.portfolio_url,
            };
            *slot = url.clone();
            Ok(())
        }),
        ShellCommand::AddSkill(skill) => edit_profile(runtime, |p| {
            p.skills.push(skill.trim().to_string());
            Ok(())
        }),
        // Drops the first matching occurrence only.
        ShellCommand::RemoveSkill(skill) => edit_profile(runtime, |p| {
            let index = p
                .skills
                .iter()
                .position(|s| s == skill.trim())
                .ok_or_else(|| format!("skill not listed: {skill}"))?;
            p.skills.remove(index);
            Ok(())
        }),
        ShellCommand::AddWork(args) => edit_profile(runtime, |p| {
            let entry = WorkExperience::v1(
                None,
                args.organisation.clone(),
                args.title.clone(),
                args.start_date.clone(),
                args.end_date.clone(),
                args.description.clone(),
            )
            .map_err(|v| format!("invalid work entry: {v}"))?;
            p.work_experience.push(entry);
            Ok(())
        }),
        ShellCommand::RemoveWork { entry_id } => edit_profile(runtime, |p| {
            let index = p
                .work_experience
                .iter()
                .position(|w| w.id.as_ref().map(EntryId::as_str) == Some(entry_id.as_str()))
                .ok_or_else(|| format!("no work entry with id {entry_id}"))?;
            p.work_experience.remove(index);
            Ok(())
        }),
        ShellCommand::AddEducation(args) => edit_profile(runtime, |p| {
            let entry = Education::v1(
                None,
                args.organisation.clone(),
                args.title.clone(),
                args.start_date.clone(),
                args.end_date.clone(),
                args.description.clone(),
            )
            .map_err(|v| format!("invalid education entry: {v}"))?;
            p.education.push(entry);
            Ok(())
        }),
        ShellCommand::RemoveEducation { entry_id } => edit_profile(runtime, |p| {
            let index = p
                .education
                .iter()
                .position(|e| e.id.as_ref().map(EntryId::as_str) == Some(entry_id.as_str()))
                .ok_or_else(|| format!("no education entry with id {entry_id}"))?;
            p.education.remove(index);
            Ok(())
        }),
        ShellCommand::Help => Ok(HELP_TEXT.to_string()),
        ShellCommand::Quit => Ok(String::new()),
    }
}

/// Applies `edit` to a copy of the session profile and submits it as a full replacement.
fn edit_profile<R, M, F>(runtime: &mut AuthRuntime<R, M>, edit: F) -> Result<String, String>
where
    R: ProfileRepo,
    M: SessionMarkerStore,
    F: FnOnce(&mut Profile) -> Result<(), String>,
{
    let mut draft = runtime
        .current_profile()
        .cloned()
        .ok_or_else(|| "Not signed in. Use `login <email>` first.".to_string())?;
    edit(&mut draft)?;
    let AuthOutcome {
        profile,
        navigate_to,
    } = runtime
        .update_profile(draft)
        .map_err(|e| format!("update failed: {e}"))?;
    Ok(format!(
        "Profile {} updated. next: {}",
        profile.id,
        navigate_to.route()
    ))
}

/// Owner-only listing of entry ids, used by `remove-work` and `remove-education`.
pub fn render_entry_ids(profile: &Profile) -> String {
    let mut out = vec!["Entry ids".to_string()];
    for w in &profile.work_experience {
        if let Some(id) = &w.id {
            out.push(format!("  {}  {} at {}", id.as_str(), w.role, w.company));
        }
    }
    for e in &profile.education {
        if let Some(id) = &e.id {
            out.push(format!("  {}  {}, {}", id.as_str(), e.degree, e.institution));
        }
    }
    if out.len() == 1 {
        out.push("  none".to_string());
    }
    out.join("\n")
}

pub fn render_profile(profile: &Profile) -> String {
    let mut out = Vec::new();
    out.push(profile.full_name.clone());
    out.push(profile.headline.clone());
    out.push(format!("<{}>", profile.email));

    out.push(String::new());
    out.push("About Me".to_string());
    if profile.bio.trim().is_empty() {
        out.push("  No bio provided.".to_string());
    } else {
        out.extend(profile.bio.lines().map(|l| format!("  {l}")));
    }

    out.push(String::new());
    out.push("Work Experience".to_string());
    if profile.work_experience.is_empty() {
        out.push("  No work experience listed.".to_string());
    }
    for w in &profile.work_experience {
        out.push(format!("  {} at {} ({})", w.role, w.company, w.period_label()));
        if !w.description.trim().is_empty() {
            out.push(format!("    {}", w.description.trim()));
        }
    }

    out.push(String::new());
    out.push("Education".to_string());
    if profile.education.is_empty() {
        out.push("  No education listed.".to_string());
    }
    for e in &profile.education {
        out.push(format!(
            "  {}, {} ({})",
            e.degree,
            e.institution,
            e.period_label()
        ));
        if !e.description.trim().is_empty() {
            out.push(format!("    {}", e.description.trim()));
        }
    }

    out.push(String::new());
    out.push("Skills".to_string());
    if profile.skills.is_empty() {
        out.push("  No skills listed.".to_string());
    } else {
        out.push(format!("  {}", profile.skills.join(", ")));
    }

    out.push(String::new());
    out.push("Connect".to_string());
    let links = [
        ("LinkedIn", &profile.linkedin_url),
        ("GitHub", &profile.github_url),
        ("Portfolio", &profile.portfolio_url),
    ];
    let mut any_link = false;
    for (label, url) in links {
        if let Some(url) = url {
            out.push(format!("  {label}: {url}"));
            any_link = true;
        }
    }
    if !any_link {
        out.push("  No contact links provided.".to_string());
    }
    out.join("\n")
}
