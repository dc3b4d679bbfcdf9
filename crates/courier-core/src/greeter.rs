//! Unary greeting calls used by the register/login flow.

use courier_types::error::GreetError;

/// `SayHello`: greeting for a newly registering user.
pub fn say_hello(name: &str) -> Result<String, GreetError> {
    let name = checked(name)?;
    Ok(format!("Hello {name}"))
}

/// `SayHelloAgain`: greeting for a returning user.
pub fn say_hello_again(name: &str) -> Result<String, GreetError> {
    let name = checked(name)?;
    Ok(format!("Hello again {name}"))
}

fn checked(name: &str) -> Result<&str, GreetError> {
    let name = name.trim();
    if name.is_empty() {
        Err(GreetError::EmptyName)
    } else {
        Ok(name)
    }
}
