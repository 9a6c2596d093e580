//! Tokens captured from production clients

/// Owner key that signed both historical access terms
pub const TERMS_OWNER: &str = "A3PKNqMx2P2EfxkJCHFaNJl7Fdw8XVYMoDLPNBL89JTk";

/// Access terms for `meme.sphinx.chat`, expiring far in the future
pub const TERMS_FUTURE: &str = "bWVtZS5zcGhpbnguY2hhdA==.qFSOa50yWeGSG8oelsMvctLYdejPRD090dsypBSx_xg=.A5TAzqurrYQm2mZ68JTmPXvsNe1OVYDBc-CWvgzDF8B6.vIlrOg==.IKq12gWXuGqqvwxUZQ5JkCs9akdDLWR1nzSwdUHhKx1rdjQgbmIdxgzrxmlIkhdsfnPOI_-pGB1HsJ8cmN56IPw=";

/// Host named by [`TERMS_FUTURE`]
pub const TERMS_FUTURE_HOST: &str = "meme.sphinx.chat";

/// Buyer named by [`TERMS_FUTURE`]
pub const TERMS_FUTURE_BUYER: &str = "A5TAzqurrYQm2mZ68JTmPXvsNe1OVYDBc-CWvgzDF8B6";

/// Expiry of [`TERMS_FUTURE`]
pub const TERMS_FUTURE_EXPIRY: u32 = 3_163_122_490;

/// Access terms for `localhost:5000` with `amt=100` metadata, long expired
pub const TERMS_EXPIRED: &str = "bG9jYWxob3N0OjUwMDA=.qFSOa50yWeGSG8oelsMvctLYdejPRD090dsypBSx_xg=.A3PKNqMx2P2EfxkJCHFaNJl7Fdw8XVYMoDLPNBL89JTk.YCxo5w==.YW10PTEwMA==.HwPsHDtW12CQDvvP96pTFcpFORxf0IVq89r4duAcAPOlZx9ElSz8THGPaquyWFbpsR6gN-Ojy6HxXx9XCLEjK2U=";

/// Host named by [`TERMS_EXPIRED`]
pub const TERMS_EXPIRED_HOST: &str = "localhost:5000";

/// Expiry of [`TERMS_EXPIRED`]
pub const TERMS_EXPIRED_EXPIRY: u32 = 1_613_523_175;

/// Object both historical terms grant, base64url
pub const TERMS_OBJECT_ID: &str = "qFSOa50yWeGSG8oelsMvctLYdejPRD090dsypBSx_xg=";

/// LSAT macaroon issued by the payment proxy, standard base64
pub const LSAT_MACAROON_B64: &str = "AgEEbHNhdAJCAAAwpHpumws6ufQoDwiTLNcge0QPUIWA0+tVY+tKPYAJ/zSfmEGlIpNm3VzxuzCqLhEp5KGiyPLUM9L+kcB7uzS+AAIPc2VydmljZXM9bWVtZTowAAISbWVtZV9jYXBhYmlsaXRpZXM9AAAGILA1VCEIExukt4nG+XR9tX8WJ2BVMiHG3UNt1uYJ+NRD";

/// Preimage presented with [`LSAT_MACAROON_B64`]
pub const LSAT_PREIMAGE_HEX: &str =
    "2ca931a1c36b48f54948b898a271a53ed91ff7d0081939a5fa511249e81cba5c";

/// Full `Authorization` header for the historical LSAT
pub fn lsat_header() -> String {
    format!("LSAT {LSAT_MACAROON_B64}:{LSAT_PREIMAGE_HEX}")
}
