/// Values substitutable into the five recognized prompt placeholders
/// (§3 PromptTemplate, §9 "Runtime-resolved prompt templates").
#[derive(Debug, Clone, Default)]
pub struct RenderVars<'a> {
    pub question: &'a str,
    pub chat_history: &'a str,
    pub context: &'a str,
    pub company_name: &'a str,
    pub services: &'a str,
}

/// Substitute the fixed placeholder set into a prompt template body.
///
/// Unknown `{...}` sequences are left untouched — a prompt author typo
/// should be visible in the rendered output, not silently eaten.
pub fn render(template: &str, vars: &RenderVars<'_>) -> String {
    template
        .replace("{question}", vars.question)
        .replace("{chat_history}", vars.chat_history)
        .replace("{context}", vars.context)
        .replace("{company_name}", vars.company_name)
        .replace("{services}", vars.services)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_all_known_placeholders() {
        let vars = RenderVars {
            question: "¿Cuánto cuesta?",
            chat_history: "user: hola",
            context: "doc1",
            company_name: "Benova",
            services: "botox, limpieza",
        };
        let out = render(
            "{company_name} - {question} - {chat_history} - {context} - {services}",
            &vars,
        );
        assert_eq!(out, "Benova - ¿Cuánto cuesta? - user: hola - doc1 - botox, limpieza");
    }

    #[test]
    fn leaves_unknown_placeholders_untouched() {
        let vars = RenderVars::default();
        let out = render("hello {unknown}", &vars);
        assert_eq!(out, "hello {unknown}");
    }
}
