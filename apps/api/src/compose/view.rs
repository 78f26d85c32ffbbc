//! View model handed to the askama templates.
//!
//! Everything here is plain text; the templates escape it on output. This
//! module only decides *what* is shown: trimming, dropping blanks, date
//! ranges, and which links and images are allowed to become markup.

use crate::models::payload::{
    CertificationEntry, DocumentPayload, EducationEntry, ExperienceEntry, LanguageEntry,
    PersonalInfo, ProjectEntry, SkillEntry,
};

/// Text with an optional target. `href` is only set for http(s) and mailto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    pub href: Option<String>,
}

impl Link {
    fn new(text: &str, target: &str) -> Self {
        Self {
            text: text.to_string(),
            href: safe_href(target),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryView {
    pub title: String,
    pub subtitle: Option<String>,
    pub dates: Option<String>,
    pub text: Option<String>,
    /// Short labelled lines such as "GPA: 3.9".
    pub notes: Vec<String>,
    pub tags: Vec<String>,
    pub link: Option<Link>,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillView {
    pub name: String,
    pub level: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageView {
    pub language: String,
    pub proficiency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentView {
    pub name: String,
    pub headline: Option<String>,
    pub summary: Option<String>,
    /// Only ever an inline `data:image/...` URI.
    pub photo: Option<String>,
    pub contacts: Vec<Link>,
    pub experience: Vec<EntryView>,
    pub education: Vec<EntryView>,
    pub projects: Vec<EntryView>,
    pub certifications: Vec<EntryView>,
    pub skills: Vec<SkillView>,
    pub languages: Vec<LanguageView>,
}

impl DocumentView {
    pub fn from_payload(payload: &DocumentPayload) -> Self {
        let info = &payload.personal_info;
        Self {
            name: info.full_name.trim().to_string(),
            headline: text(&info.title),
            summary: text(&info.summary),
            photo: info
                .photo
                .as_deref()
                .and_then(embeddable_image)
                .map(str::to_string),
            contacts: contacts(info),
            experience: payload.experience.iter().map(experience).collect(),
            education: payload.education.iter().map(education).collect(),
            projects: payload.projects.iter().map(project).collect(),
            certifications: payload.certifications.iter().map(certification).collect(),
            skills: payload.skills.iter().map(skill).collect(),
            languages: payload.languages.iter().map(language).collect(),
        }
    }

    /// Whether the lower two-column block of the split layout has anything in it.
    pub fn has_reference_sections(&self) -> bool {
        !(self.education.is_empty()
            && self.certifications.is_empty()
            && self.skills.is_empty()
            && self.languages.is_empty())
    }
}

fn text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn lines(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn joined(parts: &[Option<String>]) -> Option<String> {
    let parts: Vec<&str> = parts.iter().flatten().map(String::as_str).collect();
    (!parts.is_empty()).then(|| parts.join(" · "))
}

/// Dates are shown as given. A current entry shows `ongoing_label` instead
/// of its end date.
pub fn date_range(
    start: &Option<String>,
    end: &Option<String>,
    current: bool,
    ongoing_label: &str,
) -> Option<String> {
    let start = text(start);
    let end = if current {
        Some(ongoing_label.to_string())
    } else {
        text(end)
    };

    match (start, end) {
        (Some(s), Some(e)) => Some(format!("{s} – {e}")),
        (s, e) => s.or(e),
    }
}

/// Contact items in a fixed order: email, phone, location, website, LinkedIn, GitHub.
fn contacts(info: &PersonalInfo) -> Vec<Link> {
    let email = info.email.trim();
    let mut items = vec![Link::new(email, &format!("mailto:{email}"))];

    for value in [&info.phone, &info.location] {
        if let Some(v) = text(value) {
            items.push(Link { text: v, href: None });
        }
    }
    for value in [&info.website, &info.linkedin, &info.github] {
        if let Some(v) = text(value) {
            items.push(Link::new(&v, &v));
        }
    }
    items
}

fn experience(e: &ExperienceEntry) -> EntryView {
    EntryView {
        title: e.position.trim().to_string(),
        subtitle: joined(&[Some(e.company.trim().to_string()), text(&e.location)]),
        dates: date_range(&e.start_date, &e.end_date, e.current, "Present"),
        text: text(&e.description),
        bullets: lines(&e.achievements),
        ..Default::default()
    }
}

fn education(e: &EducationEntry) -> EntryView {
    let degree = e.degree.trim();
    let title = match text(&e.field) {
        Some(field) if !degree.is_empty() => format!("{degree} in {field}"),
        Some(field) => field,
        None if !degree.is_empty() => degree.to_string(),
        None => e.institution.trim().to_string(),
    };
    EntryView {
        title,
        subtitle: joined(&[Some(e.institution.trim().to_string()), text(&e.location)]),
        dates: date_range(&e.start_date, &e.end_date, e.current, "Ongoing"),
        notes: text(&e.gpa).map(|g| format!("GPA: {g}")).into_iter().collect(),
        bullets: lines(&e.honors),
        ..Default::default()
    }
}

fn project(p: &ProjectEntry) -> EntryView {
    EntryView {
        title: p.name.trim().to_string(),
        dates: date_range(&p.start_date, &p.end_date, false, ""),
        text: text(&p.description),
        tags: lines(&p.technologies),
        link: text(&p.link).map(|l| Link::new(&l, &l)),
        ..Default::default()
    }
}

fn certification(c: &CertificationEntry) -> EntryView {
    EntryView {
        title: c.name.trim().to_string(),
        subtitle: text(&c.issuer),
        dates: text(&c.date),
        notes: text(&c.credential_id)
            .map(|id| format!("Credential ID: {id}"))
            .into_iter()
            .collect(),
        link: text(&c.link).map(|l| Link::new(&l, &l)),
        ..Default::default()
    }
}

fn skill(s: &SkillEntry) -> SkillView {
    SkillView {
        name: s.name.trim().to_string(),
        level: text(&s.level),
        category: text(&s.category),
    }
}

fn language(l: &LanguageEntry) -> LanguageView {
    LanguageView {
        language: l.language.trim().to_string(),
        proficiency: text(&l.proficiency),
    }
}

/// Returns the URI when it is an inline `data:image/...` payload, which is the
/// only kind of image the compositor embeds.
pub fn embeddable_image(uri: &str) -> Option<&str> {
    let uri = uri.trim();
    let is_inline_image = uri
        .get(..11)
        .map(|prefix| prefix.eq_ignore_ascii_case("data:image/"))
        .unwrap_or(false);
    is_inline_image.then_some(uri)
}

/// Only http(s) and mailto targets become links; anything else is shown as text.
pub fn safe_href(target: &str) -> Option<String> {
    let target = target.trim();
    let lower = target.to_ascii_lowercase();
    let allowed = ["https://", "http://", "mailto:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme));
    allowed.then(|| target.to_string())
}
