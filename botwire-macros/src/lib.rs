use proc_macro::TokenStream;

mod methods;

/// 远端方法薄封装宏
///
/// 语法：
/// ```ignore
/// bot_methods! {
///     impl Api {
///         /// 文档注释会保留到生成的方法上
///         fn get_me() -> User = "getMe";
///         fn send_message(params) -> Value = "sendMessage";
///     }
/// }
/// ```
///
/// 为目标类型生成：
/// - `METHODS: &[&str]`：按声明顺序列出的远端方法名
/// - 每个方法一个 `#[track_caller]` 同步函数，转发给目标类型的 `call(method, params)`，
///   返回 `impl Future<Output = BotResult<T>> + Send + 'static`；无参方法发送 `()`
///
/// 远端方法名重复、参数名不是 `params` 或方法名为空时报编译错误。
#[proc_macro]
pub fn bot_methods(input: TokenStream) -> TokenStream {
    methods::expand(input.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
