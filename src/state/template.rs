use super::variables::VariableBag;

/// 渲染消息模板，将 `{{ path }}` 替换为变量值；缺失的变量渲染为空字符串。
/// 未闭合的 `{{` 原样保留。
pub fn render_template(template: &str, variables: &VariableBag) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let path = after_open[..close].trim();
                if let Some(value) = variables.get_str(path) {
                    output.push_str(&value);
                }
                rest = &after_open[close + 2..];
            }
            None => {
                output.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_nested_placeholders() {
        let mut vars = VariableBag::new();
        vars.set_path("company.name", "Acme").unwrap();
        vars.set_path("matcher.offer.price", 42).unwrap();

        let text = render_template("{{company.name}} offers {{ matcher.offer.price }} EUR", &vars);
        assert_eq!(text, "Acme offers 42 EUR");
    }

    #[test]
    fn missing_variables_render_empty() {
        let vars = VariableBag::new();
        assert_eq!(render_template("Hi {{user.name}}!", &vars), "Hi !");
    }

    #[test]
    fn unterminated_placeholder_is_kept() {
        let vars = VariableBag::new();
        assert_eq!(render_template("price {{ oops", &vars), "price {{ oops");
    }
}
