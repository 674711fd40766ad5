use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

use super::{ResponseParser, pubmed_url};
use crate::model::{Record, RecordDraft};

const PUBMED_MAX_AUTHORS: usize = 3;

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// PMIDs listed under `IdList/Id` in an ESearch response.
pub fn parse_id_list(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut ids = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => stack.push(local_name(e.local_name().as_ref())),
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(t) => {
                let in_id_list = stack.len() >= 2
                    && stack[stack.len() - 1] == "Id"
                    && stack[stack.len() - 2] == "IdList";
                if in_id_list {
                    let id = t.unescape()?.trim().to_string();
                    if !id.is_empty() {
                        ids.push(id);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(ids)
}

/// Fields collected for one `DocumentSummary` element.
#[derive(Default)]
struct Summary {
    uid: Option<String>,
    title: String,
    full_journal: String,
    journal_abbrev: String,
    pub_date: String,
    authors: Vec<String>,
    doi: Option<String>,
    author_name: String,
    id_type: String,
    id_value: String,
    /// Element depth of the `DocumentSummary` start tag.
    depth: usize,
}

impl Summary {
    fn on_text(&mut self, stack: &[String], text: &str) {
        let Some(leaf) = stack.last() else { return };
        let parent = stack.len().checked_sub(2).map(|i| stack[i].as_str());

        if stack.len() == self.depth + 1 {
            match leaf.as_str() {
                "Title" => self.title.push_str(text),
                "FullJournalName" => self.full_journal.push_str(text),
                "Source" => self.journal_abbrev.push_str(text),
                "PubDate" => self.pub_date.push_str(text),
                _ => {}
            }
            return;
        }

        match (parent, leaf.as_str()) {
            (Some("Author"), "Name") => self.author_name.push_str(text),
            (Some("ArticleId"), "IdType") => self.id_type.push_str(text),
            (Some("ArticleId"), "Value") => self.id_value.push_str(text),
            (_, "ArticleId") => self.id_value.push_str(text),
            _ => {}
        }
    }

    fn close_author(&mut self) {
        let name = std::mem::take(&mut self.author_name);
        if !name.trim().is_empty() {
            self.authors.push(name.trim().to_string());
        }
    }

    fn close_article_id(&mut self) {
        let id_type = std::mem::take(&mut self.id_type);
        let value = std::mem::take(&mut self.id_value);
        if self.doi.is_none() && id_type.trim().eq_ignore_ascii_case("doi") && !value.trim().is_empty()
        {
            self.doi = Some(value.trim().to_string());
        }
    }

    fn finish(self, source: &str) -> Option<Record> {
        let Some(pmid) = self.uid else {
            debug!("skipping document summary without uid");
            return None;
        };
        let journal = if self.full_journal.trim().is_empty() {
            self.journal_abbrev
        } else {
            self.full_journal
        };
        let record = RecordDraft {
            abstract_text: self.title.clone(),
            title: self.title,
            authors: self.authors,
            journal: Some(journal),
            publication_date: Some(self.pub_date),
            doi: self.doi,
            url: pubmed_url(&pmid),
            pmid: Some(pmid.clone()),
            ..RecordDraft::default()
        }
        .finish(source, PUBMED_MAX_AUTHORS);
        if record.is_none() {
            debug!(pmid = %pmid, "skipping document summary without usable title");
        }
        record
    }
}

/// ESummary XML parser. Abstracts are not part of ESummary, so the title
/// doubles as abstract text.
#[derive(Debug, Default, Clone, Copy)]
pub struct ESummaryParser;

impl ResponseParser for ESummaryParser {
    fn parse(&self, raw: &str, source: &str) -> Vec<Record> {
        let mut reader = Reader::from_str(raw);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<String> = Vec::new();
        let mut current: Option<Summary> = None;
        let mut records = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = local_name(e.local_name().as_ref());
                    stack.push(name);
                    match stack.last().map(String::as_str) {
                        Some("DocumentSummary") => {
                            current = Some(Summary {
                                uid: attribute(&e, "uid"),
                                depth: stack.len(),
                                ..Summary::default()
                            });
                        }
                        Some("Author") => {
                            if let Some(s) = current.as_mut()
                                && let Some(name) = attribute(&e, "Name")
                            {
                                s.author_name = name;
                            }
                        }
                        Some("ArticleId") => {
                            if let Some(s) = current.as_mut()
                                && let Some(id_type) = attribute(&e, "IdType")
                            {
                                s.id_type = id_type;
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Empty(e)) => {
                    if local_name(e.local_name().as_ref()) == "Author"
                        && let Some(s) = current.as_mut()
                        && let Some(name) = attribute(&e, "Name")
                    {
                        s.authors.push(name);
                    }
                }
                Ok(Event::Text(t)) => {
                    if let Some(s) = current.as_mut() {
                        match t.unescape() {
                            Ok(text) => s.on_text(&stack, &text),
                            Err(e) => warn!(error = %e, "undecodable text in document summary"),
                        }
                    }
                }
                Ok(Event::End(_)) => {
                    let closed = stack.pop();
                    if let Some(s) = current.as_mut() {
                        match closed.as_deref() {
                            Some("Author") => s.close_author(),
                            Some("ArticleId") => s.close_article_id(),
                            _ => {}
                        }
                    }
                    if closed.as_deref() == Some("DocumentSummary")
                        && let Some(summary) = current.take()
                        && let Some(record) = summary.finish(source)
                    {
                        records.push(record);
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, parsed = records.len(), "malformed ESummary XML, keeping parsed documents");
                    break;
                }
            }
            buf.clear();
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LiteratureType, UNKNOWN_AUTHOR, UNKNOWN_DATE, UNKNOWN_JOURNAL};

    const ESEARCH: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<!DOCTYPE eSearchResult PUBLIC "-//NLM//DTD esearch 20060628//EN" "https://eutils.ncbi.nlm.nih.gov/eutils/dtd/20060628/esearch.dtd">
<eSearchResult><Count>2</Count><RetMax>2</RetMax><RetStart>0</RetStart>
<IdList>
<Id>38012345</Id>
<Id>37654321</Id>
</IdList>
<TranslationSet/><QueryTranslation>osimertinib</QueryTranslation>
</eSearchResult>"#;

    const ESUMMARY: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<eSummaryResult>
<DocumentSummarySet status="OK">
<DbBuild>Build-2024.01.01</DbBuild>
<DocumentSummary uid="38012345">
  <PubDate>2023 Nov</PubDate>
  <Source>Clin Kidney J</Source>
  <Authors>
    <Author><Name>Tanaka K</Name><AuthType>Author</AuthType></Author>
    <Author><Name>Smith J</Name><AuthType>Author</AuthType></Author>
    <Author><Name>Lee H</Name><AuthType>Author</AuthType></Author>
    <Author><Name>Garcia M</Name><AuthType>Author</AuthType></Author>
  </Authors>
  <Title>Osimertinib-associated glomerulonephritis &amp; nephrotic syndrome: a case report</Title>
  <FullJournalName>Clinical kidney journal</FullJournalName>
  <ArticleIds>
    <ArticleId><IdType>pubmed</IdType><IdTypeN>1</IdTypeN><Value>38012345</Value></ArticleId>
    <ArticleId><IdType>doi</IdType><IdTypeN>3</IdTypeN><Value>10.1093/ckj/sfad001</Value></ArticleId>
  </ArticleIds>
  <References><Reference><Title>Unrelated nested title</Title></Reference></References>
</DocumentSummary>
<DocumentSummary uid="37654321">
  <Title>Renal adverse events of EGFR tyrosine kinase inhibitors</Title>
</DocumentSummary>
<DocumentSummary uid="0">
  <error>cannot get document summary</error>
</DocumentSummary>
</DocumentSummarySet>
</eSummaryResult>"#;

    #[test]
    fn id_list_extracts_pmids_in_order() {
        let ids = parse_id_list(ESEARCH).unwrap();
        assert_eq!(ids, vec!["38012345", "37654321"]);
    }

    #[test]
    fn id_list_without_ids_is_empty() {
        let xml = "<eSearchResult><Count>0</Count><IdList/></eSearchResult>";
        assert!(parse_id_list(xml).unwrap().is_empty());
    }

    #[test]
    fn id_list_ignores_ids_outside_id_list() {
        let xml = "<eSearchResult><Id>1</Id><IdList><Id>2</Id></IdList></eSearchResult>";
        assert_eq!(parse_id_list(xml).unwrap(), vec!["2"]);
    }

    #[test]
    fn summary_extracts_fixed_fields() {
        let records = ESummaryParser.parse(ESUMMARY, "PubMed");
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.pmid.as_deref(), Some("38012345"));
        assert_eq!(
            first.title,
            "Osimertinib-associated glomerulonephritis & nephrotic syndrome: a case report"
        );
        assert_eq!(first.authors, vec!["Tanaka K", "Smith J", "Lee H"]);
        assert_eq!(first.journal, "Clinical kidney journal");
        assert_eq!(first.publication_date, "2023 Nov");
        assert_eq!(first.doi.as_deref(), Some("10.1093/ckj/sfad001"));
        assert_eq!(first.url, "https://pubmed.ncbi.nlm.nih.gov/38012345/");
        assert_eq!(first.abstract_text, first.title);
        assert_eq!(first.literature_type, LiteratureType::Other);
        assert_eq!(first.source, "PubMed");
    }

    #[test]
    fn summary_missing_fields_get_defaults() {
        let records = ESummaryParser.parse(ESUMMARY, "PubMed");
        let second = &records[1];
        assert_eq!(second.authors, vec![UNKNOWN_AUTHOR]);
        assert_eq!(second.journal, UNKNOWN_JOURNAL);
        assert_eq!(second.publication_date, UNKNOWN_DATE);
        assert_eq!(second.doi, None);
    }

    #[test]
    fn attribute_style_authors_and_ids_are_read() {
        let xml = r#"<DocumentSummarySet>
<DocumentSummary uid="111">
  <Title>Erlotinib and acute interstitial nephritis</Title>
  <AuthorList><Author Name="Doe J"/><Author Name="Roe R"></Author></AuthorList>
  <ArticleIds><ArticleId IdType="doi">10.1000/xyz</ArticleId></ArticleIds>
</DocumentSummary>
</DocumentSummarySet>"#;
        let records = ESummaryParser.parse(xml, "PubMed");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].authors, vec!["Doe J", "Roe R"]);
        assert_eq!(records[0].doi.as_deref(), Some("10.1000/xyz"));
    }

    #[test]
    fn summary_without_uid_or_title_is_skipped() {
        let xml = r#"<DocumentSummarySet>
<DocumentSummary><Title>Title without an identifier at all</Title></DocumentSummary>
<DocumentSummary uid="5"><Title>Short</Title></DocumentSummary>
</DocumentSummarySet>"#;
        assert!(ESummaryParser.parse(xml, "PubMed").is_empty());
    }

    #[test]
    fn truncated_xml_keeps_completed_documents() {
        let cut = ESUMMARY.find("<DocumentSummary uid=\"37654321\">").unwrap();
        let truncated = format!("{}<DocumentSummary uid=\"9\"><Title>Broken</Ti", &ESUMMARY[..cut]);
        let records = ESummaryParser.parse(&truncated, "PubMed");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pmid.as_deref(), Some("38012345"));
    }

    #[test]
    fn reparsing_is_idempotent() {
        assert_eq!(
            ESummaryParser.parse(ESUMMARY, "PubMed"),
            ESummaryParser.parse(ESUMMARY, "PubMed")
        );
    }

    #[test]
    fn garbage_input_yields_nothing() {
        assert!(ESummaryParser.parse("not xml at all <<<", "PubMed").is_empty());
        assert!(ESummaryParser.parse("", "PubMed").is_empty());
    }
}
