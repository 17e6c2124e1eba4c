use serde::{Deserialize, Serialize};

use super::mailer::OutboundEmail;
use crate::board::domain::{JobCard, JobPostId};

pub const DIGEST_SUBJECT: &str = "Latest Job Opportunities for You";

/// Listing fields carried into a digest email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub job_id: JobPostId,
    pub job_title: String,
    pub company_name: String,
    pub location: String,
    pub employment_type: String,
    pub salary_from: u32,
    pub salary_to: u32,
}

impl From<&JobCard> for DigestEntry {
    fn from(card: &JobCard) -> Self {
        Self {
            job_id: card.job.id.clone(),
            job_title: card.job.job_title.clone(),
            company_name: card.company.name.clone(),
            location: card.job.location.clone(),
            employment_type: card.job.employment_type.as_str().to_string(),
            salary_from: card.job.salary_from,
            salary_to: card.job.salary_to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestRecipient {
    pub email: String,
    pub name: String,
}

pub fn digest_email(recipient: &DigestRecipient, entries: &[DigestEntry], public_url: &str) -> OutboundEmail {
    OutboundEmail {
        to: vec![recipient.email.clone()],
        subject: DIGEST_SUBJECT.to_string(),
        html: render_digest(entries, public_url),
    }
}

pub fn render_digest(entries: &[DigestEntry], public_url: &str) -> String {
    let base = public_url.trim_end_matches('/');
    let mut html = String::from(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\n\
         <h1 style=\"color: #333;\">Latest Job Opportunities</h1>\n",
    );

    for entry in entries {
        html.push_str(&format!(
            "<div style=\"margin-bottom: 20px; padding: 15px; border: 1px solid #eee; border-radius: 5px;\">\n\
             <h2 style=\"margin: 0;\">{title}</h2>\n\
             <p style=\"color: #666;\">{company} &bull; {location}</p>\n\
             <p style=\"color: #666;\">{kind} &bull; {salary}</p>\n\
             <a href=\"{base}/job/{id}\">View job</a>\n\
             </div>\n",
            title = escape_html(&entry.job_title),
            company = escape_html(&entry.company_name),
            location = escape_html(&entry.location),
            kind = escape_html(&entry.employment_type),
            salary = format_salary_range(entry.salary_from, entry.salary_to),
            id = escape_html(entry.job_id.as_str()),
        ));
    }

    html.push_str(&format!(
        "<div style=\"margin-top: 30px; text-align: center;\">\n\
         <a href=\"{base}\" style=\"background-color: #007bff; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px;\">View More Jobs</a>\n\
         </div>\n</div>\n"
    ));
    html
}

/// `$4,000 - $6,500`
pub fn format_salary_range(from: u32, to: u32) -> String {
    format!("${} - ${}", group_thousands(from), group_thousands(to))
}

fn group_thousands(value: u32) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> DigestEntry {
        DigestEntry {
            job_id: JobPostId::from("job-9"),
            job_title: title.to_string(),
            company_name: "Acme".to_string(),
            location: "Germany".to_string(),
            employment_type: "full-time".to_string(),
            salary_from: 4_000,
            salary_to: 12_500,
        }
    }

    #[test]
    fn salary_range_groups_thousands() {
        assert_eq!(format_salary_range(500, 50_000), "$500 - $50,000");
        assert_eq!(format_salary_range(4_000, 1_234_567), "$4,000 - $1,234,567");
    }

    #[test]
    fn digest_links_back_to_listings_and_escapes_titles() {
        let recipient = DigestRecipient {
            email: "seeker@example.com".to_string(),
            name: "Sam".to_string(),
        };
        let email = digest_email(
            &recipient,
            &[entry("Rust <Lead>")],
            "https://hirely.test/",
        );
        assert_eq!(email.to, vec!["seeker@example.com".to_string()]);
        assert_eq!(email.subject, DIGEST_SUBJECT);
        assert!(email.html.contains("https://hirely.test/job/job-9"));
        assert!(email.html.contains("Rust &lt;Lead&gt;"));
        assert!(email.html.contains("$4,000 - $12,500"));
    }
}
